use assert_cmd::{assert::Assert, prelude::*};
use predicates::prelude::*;
use ruby_index::test_utils::{Context, with_context};
use std::path::Path;
use std::process::Command;

fn cli_cmd(args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("ruby_index_cli").unwrap();
    cmd.args(args);
    cmd
}

fn cli(args: &[&str]) -> Assert {
    cli_cmd(args).assert()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout_json(args: &[&str]) -> serde_json::Value {
    let output = cli_cmd(args).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let json_start = stdout.find(['{', '[']).expect("no JSON in output");
    serde_json::from_str(&stdout[json_start..]).unwrap()
}

#[test]
fn prints_help() {
    cli(&["--help"])
        .success()
        .stdout(predicate::str::contains("Indexes a Ruby workspace and queries its symbols"))
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--list"))
        .stdout(predicate::str::contains("--namespace"))
        .stdout(predicate::str::contains("--method"))
        .stdout(predicate::str::contains("--stop-after"));
}

#[test]
fn paths_argument_variants() {
    with_context(|context| {
        context.write("dir1/file1.rb", "class Class1\nend\n");
        context.write("dir1/file2.rb", "class Class2\nend\n");
        context.write("dir2/file1.rb", "class Class3\nend\n");
        context.write("dir2/file2.rb", "class Class4\nend\n");

        cli(&[
            path_str(&context.absolute_path_to("dir1")),
            path_str(&context.absolute_path_to("dir2/file1.rb")),
        ])
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("Indexed 3 files"));
    });
}

#[test]
fn prints_index_metrics() {
    with_context(|context| {
        context.write("file1.rb", {
            "
            class FirstClass
              def foo; end
            end
            "
        });
        context.write("file2.rb", "module SecondModule\nend\n");

        cli(&[path_str(&context.absolute_path())])
            .success()
            .stderr(predicate::str::is_empty())
            .stdout(predicate::str::contains("Indexed 2 files"))
            .stdout(predicate::str::contains("Found 3 declarations"))
            .stdout(predicate::str::contains("Found 3 entries"));
    });
}

#[test]
fn stop_after() {
    let context = Context::new();
    context.write("file1.rb", "class Class1\nend\n");
    context.write("file2.rb", "class Class2\nend\n");
    let root = context.absolute_path();

    cli(&[path_str(&root), "--stop-after", "listing"])
        .success()
        .stdout(predicate::str::contains("Listed 2 files"))
        .stdout(predicate::str::contains("Indexed").not());

    cli(&[path_str(&root), "--stop-after", "indexing", "--list"])
        .success()
        .stdout(predicate::str::contains("Indexed 2 files"))
        .stdout(predicate::str::contains("namespaces").not());
}

#[test]
fn lists_classes_and_modules() {
    let context = Context::new();
    context.write("foo.rb", "class Foo; end\nmodule Bar; end\n");

    assert_eq!(
        stdout_json(&[path_str(&context.absolute_path()), "--list"]),
        serde_json::json!({
            "namespaces": [
                {"name": "Foo", "type": "class"},
                {"name": "Bar", "type": "module"},
            ]
        })
    );
}

#[test]
fn describes_namespaces_and_methods() {
    let context = Context::new();
    context.write("foo.rb", {
        "
        module Greeting
          def hello(name); end
        end

        class Foo
          include Greeting
        end
        "
    });
    let root = context.absolute_path();

    let namespaces = stdout_json(&[path_str(&root), "--namespace", "Foo", "--namespace", "Nope"]);
    assert_eq!(namespaces["namespaces"][0]["ancestors"], serde_json::json!(["Foo", "Greeting", "Object"]));
    assert_eq!(namespaces["namespaces"][1]["kind"], "unknown");

    let methods = stdout_json(&[path_str(&root), "--method", "Foo#hello"]);
    assert_eq!(methods["methods"][0]["entries"][0]["owner"], "Greeting");
    assert_eq!(
        methods["methods"][0]["entries"][0]["parameters"],
        serde_json::json!([{"name": "name", "kind": "required"}])
    );
}

#[test]
fn invalid_configuration_fails() {
    with_context(|context| {
        context.write(".ruby-index.toml", "max_listed_namespaces = \"many\"\n");

        cli(&[path_str(&context.absolute_path())])
            .failure()
            .stderr(predicate::str::contains("ConfigError"));
    });
}
