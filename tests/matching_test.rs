//! Operation matching tests against a small annotated bookstore API.

use semnav::{
    find_operation, ApiDocument, Method, OperationQuery, OperationSchema, ParameterLocation,
    SearchOptions,
};
use serde_json::json;

const BOOKSTORE: &str = r##"{
    "openapi": "3.0.3",
    "@context": {
        "schema": "http://schema.org/",
        "Book": "schema:Book",
        "isbn": "schema:isbn",
        "author": "schema:author",
        "title": "schema:name"
    },
    "servers": [{ "url": "https://books.example.com" }],
    "paths": {
        "/books": {
            "get": {
                "operationId": "listBooks",
                "parameters": [{ "name": "author", "in": "query", "schema": { "type": "string" } }],
                "responses": { "200": { "content": { "application/json": {
                    "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
                } } } }
            },
            "post": {
                "operationId": "addBook",
                "@id": "schema:CreateAction",
                "security": [{ "bearer": [] }],
                "requestBody": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Book" }
                } } },
                "responses": { "201": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Book" }
                } } } }
            }
        },
        "/books/{isbn}": {
            "parameters": [{ "name": "isbn", "in": "path", "schema": { "type": "string" } }],
            "get": {
                "operationId": "getBook",
                "responses": { "200": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Book" }
                } } } }
            },
            "delete": {
                "operationId": "removeBook",
                "@id": "schema:DeleteAction",
                "responses": { "204": { "description": "removed" } }
            }
        },
        "/ping": {
            "get": {
                "operationId": "ping",
                "security": [],
                "responses": { "204": { "description": "pong" } }
            }
        },
        "/authors/{author}/latest": {
            "get": {
                "operationId": "latestBook",
                "parameters": [{ "name": "author", "in": "path", "schema": { "type": "string" } }],
                "responses": { "200": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Summary" }
                } } } }
            }
        }
    },
    "components": {
        "schemas": {
            "Book": {
                "type": "object",
                "required": ["isbn", "title"],
                "properties": {
                    "isbn": { "type": "string" },
                    "title": { "type": "string" },
                    "author": { "type": "string" },
                    "pages": { "type": "integer", "default": 100 }
                }
            },
            "Summary": {
                "type": "object",
                "@id": "http://schema.org/Book",
                "properties": { "title": { "type": "string" } }
            }
        }
    }
}"##;

fn bookstore() -> ApiDocument {
    ApiDocument::parse(BOOKSTORE).unwrap()
}

fn find(
    query: OperationQuery,
    options: &SearchOptions,
    authenticated: bool,
) -> Option<String> {
    find_operation(&bookstore(), &query, options, authenticated).and_then(|op| op.operation_id)
}

mod queries {
    use super::*;

    #[test]
    fn action_by_semantic_id() {
        let none = SearchOptions::new();
        assert_eq!(
            find(OperationQuery::Action("http://schema.org/DeleteAction".into()), &none, false).as_deref(),
            Some("removeBook")
        );
        assert_eq!(
            find(OperationQuery::Action("addBook".into()), &none, false).as_deref(),
            Some("addBook")
        );
    }

    #[test]
    fn returns_only_considers_get() {
        // addBook also answers with a Book, but only GET operations return data
        let op = find_operation(
            &bookstore(),
            &OperationQuery::Returns("http://schema.org/Book".into()),
            &SearchOptions::new(),
            false,
        )
        .unwrap();
        assert_eq!(op.verb, Method::Get);
        assert_eq!(op.operation_id.as_deref(), Some("getBook"));
    }

    #[test]
    fn lists_by_item_type() {
        assert_eq!(
            find(OperationQuery::Lists("http://schema.org/Book".into()), &SearchOptions::new(), false)
                .as_deref(),
            Some("listBooks")
        );
    }

    #[test]
    fn path_by_concrete_url() {
        let none = SearchOptions::new();
        assert_eq!(
            find(OperationQuery::Path("/books/978-3".into()), &none, false).as_deref(),
            Some("getBook")
        );
        assert_eq!(
            find(OperationQuery::Path("https://books.example.com/books?author=Le+Guin".into()), &none, false)
                .as_deref(),
            Some("listBooks")
        );
        assert!(find(OperationQuery::Path("/books/978-3/reviews".into()), &none, false).is_none());
    }

    #[test]
    fn unknown_type_has_no_match() {
        assert!(find(
            OperationQuery::Returns("http://schema.org/Movie".into()),
            &SearchOptions::new(),
            false
        )
        .is_none());
    }
}

mod ranking {
    use super::*;

    #[test]
    fn supplied_parameters_pick_the_better_operation() {
        let options = SearchOptions::new().with_parameter("http://schema.org/author");
        assert_eq!(
            find(OperationQuery::Returns("http://schema.org/Book".into()), &options, false).as_deref(),
            Some("latestBook")
        );
    }

    #[test]
    fn ties_keep_document_order() {
        let options = SearchOptions::new().with_parameter("http://schema.org/unrelated");
        assert_eq!(
            find(OperationQuery::Returns("http://schema.org/Book".into()), &options, false).as_deref(),
            Some("getBook")
        );
    }

    #[test]
    fn required_fields_exclude_thin_responses() {
        let options = SearchOptions::new()
            .with_parameter("http://schema.org/author")
            .require_field("http://schema.org/isbn");
        assert_eq!(
            find(OperationQuery::Returns("http://schema.org/Book".into()), &options, false).as_deref(),
            Some("getBook")
        );
    }

    #[test]
    fn security_flag_depends_on_authentication() {
        let document = bookstore();
        let query = OperationQuery::Action("addBook".into());
        let anonymous = find_operation(&document, &query, &SearchOptions::new(), false).unwrap();
        assert!(anonymous.has_security);
        assert!(anonymous.security_required);

        let signed_in = find_operation(&document, &query, &SearchOptions::new(), true).unwrap();
        assert!(!signed_in.security_required);
    }

    #[test]
    fn empty_security_list_is_still_declared() {
        let ping = find_operation(
            &bookstore(),
            &OperationQuery::Action("ping".into()),
            &SearchOptions::new(),
            false,
        )
        .unwrap();
        assert!(ping.has_security);
        assert!(ping.security_required);

        let getter = find_operation(
            &bookstore(),
            &OperationQuery::Action("getBook".into()),
            &SearchOptions::new(),
            false,
        )
        .unwrap();
        assert!(!getter.security_required);
    }
}

mod operation_schema {
    use super::*;

    fn schema_of(id: &str) -> OperationSchema {
        let op = find_operation(
            &bookstore(),
            &OperationQuery::Action(id.into()),
            &SearchOptions::new(),
            true,
        )
        .unwrap();
        OperationSchema::new(op)
    }

    #[test]
    fn path_level_parameters_are_merged() {
        let schema = schema_of("getBook");
        let isbn = &schema.parameters()[0];
        assert_eq!(isbn.name, "isbn");
        assert_eq!(isbn.location, ParameterLocation::Path);
        assert!(isbn.required);
        assert_eq!(isbn.semantics, ["http://schema.org/isbn"]);
    }

    #[test]
    fn body_properties_become_parameters() {
        let schema = schema_of("addBook");
        let body: Vec<(&str, bool)> = schema
            .parameters_in(ParameterLocation::Body)
            .map(|p| (p.name.as_str(), p.required))
            .collect();
        assert_eq!(
            body,
            [("isbn", true), ("title", true), ("author", false), ("pages", false)]
        );
        assert_eq!(schema.default_values().get("pages"), Some(&json!(100)));
    }

    #[test]
    fn values_resolve_semantic_id_first() {
        let schema = schema_of("addBook");
        let missing: Vec<&str> = schema
            .missing_parameters(
                &json!({ "http://schema.org/isbn": "978-3", "title": "The Dispossessed" }),
                true,
            )
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert!(missing.is_empty());

        let missing: Vec<&str> = schema
            .missing_parameters(&json!({ "isbn": null }), true)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(missing, ["isbn", "title"]);
    }

    #[test]
    fn defaults_can_be_preset() {
        let mut schema = schema_of("listBooks");
        assert!(schema.set_default("author", json!("Le Guin")));
        assert!(!schema.set_default("publisher", json!("Ace")));
        assert_eq!(schema.default_values().get("author"), Some(&json!("Le Guin")));
    }
}
