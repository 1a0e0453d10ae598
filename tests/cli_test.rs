//! CLI integration tests for the semnav binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("semnav"))
}

// Helper to create a temp document file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const SHOP: &str = r##"{
    "@context": { "schema": "http://schema.org/", "Order": "schema:Order" },
    "paths": {
        "/orders/{id}": {
            "get": {
                "operationId": "getOrder",
                "parameters": [{ "name": "id", "in": "path", "@id": "schema:orderNumber", "schema": { "type": "string" } }],
                "responses": { "200": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Order" }
                } } } }
            }
        },
        "/orders": {
            "post": {
                "operationId": "createOrder",
                "requestBody": { "content": { "application/json": { "schema": {
                    "type": "object",
                    "required": ["item"],
                    "properties": { "item": { "type": "string" }, "quantity": { "type": "integer" } }
                } } } },
                "responses": { "201": { "description": "created" } }
            }
        }
    },
    "components": {
        "schemas": {
            "Order": { "type": "object", "properties": { "total": { "type": "number" } } }
        }
    }
}"##;

mod expand_command {
    use super::*;

    #[test]
    fn prints_expanded_document() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args(["expand", doc.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""@id":"http://schema.org/Order""#))
            .stdout(predicate::str::contains("$ref").not());
    }

    #[test]
    fn pretty_output() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args(["expand", doc.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            // Pretty output has newlines and indentation
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn output_file() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);
        let output = dir.path().join("expanded.json");

        cmd()
            .args([
                "expand",
                doc.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success();

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains("http://schema.org/orderNumber"));
    }

    #[test]
    fn yaml_document() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(
            &dir,
            "ping.yaml",
            "paths:\n  /ping:\n    get:\n      operationId: ping\n      responses:\n        204:\n          description: pong\n",
        );

        cmd()
            .args(["expand", doc.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""204""#));
    }

    #[test]
    fn missing_file_exit_code() {
        cmd()
            .args(["expand", "/nonexistent/shop.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_json_exit_code() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "broken.json", r#"{"paths": "#);

        cmd()
            .args(["expand", doc.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn cyclic_reference_exit_code() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(
            &dir,
            "cycle.json",
            r##"{"components":{"schemas":{"A":{"properties":{"b":{"$ref":"#/components/schemas/A"}}}}}}"##,
        );

        cmd()
            .args(["expand", doc.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("cyclic reference"));
    }
}

mod find_command {
    use super::*;

    #[test]
    fn finds_by_returned_type() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args([
                "find",
                doc.to_str().unwrap(),
                "--returns",
                "http://schema.org/Order",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""operationId":"getOrder""#))
            .stdout(predicate::str::contains(r#""path":"/orders/{id}""#))
            .stdout(predicate::str::contains(r#""location":"path""#));
    }

    #[test]
    fn finds_by_url() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args(["find", doc.to_str().unwrap(), "--path", "/orders/A-1"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""method":"get""#));
    }

    #[test]
    fn no_match_exit_code() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args(["find", doc.to_str().unwrap(), "--lists", "http://schema.org/Order"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No operation found"));
    }

    #[test]
    fn requires_a_query() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args(["find", doc.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("required"));
    }

    #[test]
    fn query_kinds_conflict() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args([
                "find",
                doc.to_str().unwrap(),
                "--action",
                "getOrder",
                "--path",
                "/orders/1",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }
}

mod request_command {
    use super::*;

    #[test]
    fn builds_request_from_semantic_values() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args([
                "request",
                doc.to_str().unwrap(),
                "--returns",
                "http://schema.org/Order",
                "--value",
                "http://schema.org/orderNumber=A 1",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""url":"/orders/A%201""#));
    }

    #[test]
    fn json_values_keep_their_type() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args([
                "request",
                doc.to_str().unwrap(),
                "--action",
                "createOrder",
                "--value",
                "item=book",
                "--value",
                "quantity=2",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""method":"post""#))
            .stdout(predicate::str::contains(r#""body":{"item":"book","quantity":2}"#));
    }

    #[test]
    fn missing_value_exit_code() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args(["request", doc.to_str().unwrap(), "--action", "createOrder"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("required parameters are missing: item"));
    }

    #[test]
    fn malformed_value_exit_code() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "shop.json", SHOP);

        cmd()
            .args([
                "request",
                doc.to_str().unwrap(),
                "--action",
                "createOrder",
                "--value",
                "item",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("expected KEY=VALUE"));
    }
}
