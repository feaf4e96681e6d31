use crate::model::id::Id;

#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord)]
pub struct DeclarationMarker;
/// `DeclarationId` is the ID of a fully qualified name, such as `Foo::Bar`, `Foo::<Class:Foo>` or `Foo#baz`
pub type DeclarationId = Id<DeclarationMarker>;

#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord)]
pub struct EntryMarker;
// EntryId is the ID of a single entry contributed by one file
pub type EntryId = Id<EntryMarker>;

#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord)]
pub struct UriMarker;
// UriId is the ID of a URI, which uniquely identifies a document
pub type UriId = Id<UriMarker>;
