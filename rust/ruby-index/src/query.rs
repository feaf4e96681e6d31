use rayon::prelude::*;

use crate::model::entry::Entry;
use crate::model::identity_maps::IdentityHashSet;
use crate::model::ids::DeclarationId;
use crate::model::index::{Declaration, Index};
use crate::model::naming;

/// Searches declarations by their unqualified name in parallel using rayon.
///
/// A declaration matches when every character of `query` appears in its name in order, ignoring case. Results are
/// ranked by how compact the match is and then alphabetically, and capped at `limit`. An empty query returns the
/// namespaces in declaration order, capped at `namespace_limit`. Each declaration is represented by its first entry.
#[must_use]
pub fn fuzzy_search<'a>(index: &'a Index, query: &str, limit: usize, namespace_limit: usize) -> Vec<&'a Entry> {
    if query.is_empty() {
        return index
            .namespaces()
            .into_iter()
            .filter(|declaration| !naming::is_singleton(declaration.name()))
            .filter_map(|declaration| first_entry(index, declaration))
            .take(namespace_limit)
            .collect();
    }

    let mut matches: Vec<(usize, &str, &Declaration)> = index
        .declarations()
        .par_iter()
        .filter_map(|(_, declaration)| {
            let name = declaration.name();
            if naming::is_singleton(name) {
                return None;
            }

            let short_name = short_name(name);
            match_span(query, short_name).map(|span| (span, short_name, declaration))
        })
        .collect();

    matches.par_sort_unstable_by(|(a_span, a_name, a), (b_span, b_name, b)| {
        a_span
            .cmp(b_span)
            .then_with(|| a_name.cmp(b_name))
            .then_with(|| a.name().cmp(b.name()))
    });

    matches
        .into_iter()
        .filter_map(|(_, _, declaration)| first_entry(index, declaration))
        .take(limit)
        .collect()
}

/// Completes a constant name typed as `prefix` inside `nesting`. Namespaces and constants visible from each lexical
/// scope are returned, innermost scope first, then the ones at the top level.
#[must_use]
pub fn prefix_search<'a>(index: &'a Index, prefix: &str, nesting: &[String]) -> Vec<&'a Entry> {
    let mut levels = naming::nesting_levels(nesting);
    levels.push(String::new());

    let mut seen: IdentityHashSet<DeclarationId> = IdentityHashSet::default();
    let mut results = Vec::new();

    for level in levels {
        let qualified_prefix = naming::qualify(&level, prefix);

        let mut found: Vec<&Declaration> = index
            .declarations()
            .values()
            .filter(|declaration| {
                let name = declaration.name();
                name.starts_with(&qualified_prefix) && !name.contains('#') && !naming::is_singleton(name)
            })
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));

        for declaration in found {
            if seen.insert(DeclarationId::from(declaration.name()))
                && let Some(entry) = first_entry(index, declaration)
            {
                results.push(entry);
            }
        }
    }

    results
}

fn first_entry<'a>(index: &'a Index, declaration: &'a Declaration) -> Option<&'a Entry> {
    index.entries_of(declaration).next()
}

fn short_name(name: &str) -> &str {
    match name.rsplit_once('#') {
        Some((_, method)) => method,
        None => naming::last_segment(name),
    }
}

/// Length of the shortest stretch of `target` that contains all characters of `query` in order, with both sides
/// lowercased first. `None` if `query` is not a subsequence of `target`
#[must_use]
fn match_span(query: &str, target: &str) -> Option<usize> {
    let query: Vec<char> = query.to_lowercase().chars().collect();
    let target: Vec<char> = target.to_lowercase().chars().collect();
    let first = *query.first()?;

    let mut best: Option<usize> = None;

    for (start, t_char) in target.iter().enumerate() {
        if *t_char != first {
            continue;
        }

        // Match the rest of the query greedily from this start, so character ordering is taken into account
        let mut query_chars = query.iter().skip(1).peekable();
        let mut end = start;

        for (position, t_char) in target.iter().enumerate().skip(start + 1) {
            if query_chars.peek().is_none() {
                break;
            }

            if let Some(&&q_char) = query_chars.peek()
                && q_char == *t_char
            {
                query_chars.next();
                end = position;
            }
        }

        // If the target ran out with query characters left, no later start can match either
        if query_chars.peek().is_some() {
            break;
        }

        let span = end - start + 1;
        best = Some(best.map_or(span, |current| current.min(span)));
    }

    best
}
