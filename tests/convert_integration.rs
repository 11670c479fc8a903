//! End-to-end conversion tests over complete parsed-document trees.
//!
//! Trees are built the way the external parser dumps them (JSON AST) and run
//! through the document driver, then checked against the expected CWL
//! document structure.

use serde_json::{json, Value};
use wdl2cwl::{convert_document, CwlDocument, SyntaxNode, WdlVersion};

fn parse(tree: Value) -> SyntaxNode {
    SyntaxNode::from_json(&tree.to_string()).unwrap()
}

fn terminal(kind: &str, text: &str) -> Value {
    json!({"str": kind, "source_string": text})
}

fn document(definitions: Vec<Value>) -> Value {
    json!({
        "name": "Document",
        "attributes": {"imports": [], "definitions": definitions}
    })
}

fn declaration(name: &str, ty: &str, expression: Value) -> Value {
    json!({
        "name": "Declaration",
        "attributes": {
            "name": terminal("identifier", name),
            "type": terminal("type", ty),
            "expression": expression
        }
    })
}

/// A task with one File input `f`, command `echo ${f}`, and one output
/// `File out = "out.txt"`.
fn echo_task(name: &str) -> Value {
    json!({
        "name": "Task",
        "attributes": {
            "name": terminal("identifier", name),
            "declarations": [declaration("f", "File", Value::Null)],
            "sections": [
                {
                    "name": "RawCommand",
                    "attributes": {"parts": [
                        terminal("cmd_part", "\n        echo "),
                        {
                            "name": "CommandParameter",
                            "attributes": {"expr": terminal("identifier", "f")}
                        },
                        terminal("cmd_part", "\n    ")
                    ]}
                },
                {
                    "name": "Outputs",
                    "attributes": {"attributes": [
                        {
                            "name": "Output",
                            "attributes": {
                                "name": terminal("identifier", "out"),
                                "type": terminal("type", "File"),
                                "expression": terminal("string", "out.txt")
                            }
                        }
                    ]}
                }
            ]
        }
    })
}

/// A task `t` with one non-defaulted input `x: Int` and one output
/// `y: File = "y.txt"`.
fn t_task() -> Value {
    json!({
        "name": "Task",
        "attributes": {
            "name": terminal("identifier", "t"),
            "declarations": [declaration("x", "Int", Value::Null)],
            "sections": [
                {
                    "name": "RawCommand",
                    "attributes": {"parts": [terminal("cmd_part", "true")]}
                },
                {
                    "name": "Outputs",
                    "attributes": {"attributes": [
                        {
                            "name": "Output",
                            "attributes": {
                                "name": terminal("identifier", "y"),
                                "type": terminal("type", "File"),
                                "expression": terminal("string", "y.txt")
                            }
                        }
                    ]}
                }
            ]
        }
    })
}

fn call(task: &str, mappings: Vec<(&str, Value)>) -> Value {
    let body = if mappings.is_empty() {
        Value::Null
    } else {
        let maps: Vec<Value> = mappings
            .into_iter()
            .map(|(key, value)| {
                json!({
                    "name": "IOMapping",
                    "attributes": {"key": terminal("identifier", key), "value": value}
                })
            })
            .collect();
        json!({
            "name": "CallBody",
            "attributes": {"io": [
                {"name": "Inputs", "attributes": {"map": maps}}
            ]}
        })
    };
    json!({
        "name": "Call",
        "attributes": {
            "task": terminal("fqn", task),
            "alias": Value::Null,
            "body": body
        }
    })
}

fn workflow(name: &str, body: Vec<Value>) -> Value {
    json!({
        "name": "Workflow",
        "attributes": {"name": terminal("identifier", name), "body": body}
    })
}

fn as_json(document: &CwlDocument) -> Value {
    serde_json::to_value(document).unwrap()
}

#[test]
fn file_input_command_uses_path_accessor() {
    let tree = parse(document(vec![echo_task("echo_file")]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    assert_eq!(converted.documents.len(), 1);

    let tool = as_json(&converted.documents[0]);
    assert_eq!(tool["id"], "echo_file");
    assert_eq!(tool["class"], "CommandLineTool");
    assert_eq!(tool["inputs"], json!([{"id": "f", "type": "File"}]));
    assert_eq!(
        tool["arguments"],
        json!([{"valueFrom": "echo $(inputs.f.path)", "shellQuote": false}])
    );
    assert_eq!(tool["outputs"][0]["outputBinding"]["glob"], "out.txt");
}

#[test]
fn unbound_input_becomes_workflow_input() {
    let tree = parse(document(vec![t_task(), workflow("w", vec![call("t", vec![])])]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let wf = as_json(&converted.documents[1]);

    assert_eq!(wf["class"], "Workflow");
    assert_eq!(wf["inputs"], json!([{"id": "t_x", "type": "int"}]));
    assert_eq!(
        wf["steps"][0]["in"],
        json!([{"id": "x", "source": "t_x"}])
    );
    assert_eq!(wf["steps"][0]["run"], "t.cwl");
}

#[test]
fn single_variable_scatter_wires_collection_source() {
    let scatter = json!({
        "name": "Scatter",
        "attributes": {
            "item": terminal("identifier", "i"),
            "collection": terminal("identifier", "items"),
            "body": [call("t", vec![("x", terminal("identifier", "i"))])]
        }
    });
    let items_decl = json!({
        "name": "Declaration",
        "attributes": {
            "name": terminal("identifier", "items"),
            "type": {
                "name": "Type",
                "attributes": {
                    "name": terminal("type", "Array"),
                    "subtype": [terminal("type", "Int")]
                }
            },
            "expression": Value::Null
        }
    });
    let tree = parse(document(vec![
        t_task(),
        workflow("w", vec![items_decl, scatter]),
    ]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let wf = as_json(&converted.documents[1]);

    let step = &wf["steps"][0];
    assert_eq!(step["scatter"], json!(["x"]));
    assert!(step.get("scatterMethod").is_none());
    assert_eq!(step["in"], json!([{"id": "x", "source": "items"}]));
    let classes: Vec<&str> = wf["requirements"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["class"].as_str().unwrap())
        .collect();
    assert!(classes.contains(&"ScatterFeatureRequirement"));
    assert!(classes.contains(&"StepInputExpressionRequirement"));
    // scattered step outputs propagate as array-typed workflow outputs
    assert_eq!(wf["outputs"][0]["type"], "File[]");
}

#[test]
fn missing_output_block_propagates_step_outputs() {
    let tree = parse(document(vec![t_task(), workflow("w", vec![call("t", vec![])])]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let wf = as_json(&converted.documents[1]);

    assert_eq!(
        wf["outputs"],
        json!([{"id": "t_y", "type": "File", "outputSource": "#t/y"}])
    );
}

#[test]
fn explicit_qualified_output_resolves_through_the_table() {
    let outputs = json!({
        "name": "WorkflowOutputs",
        "attributes": {"outputs": [
            {
                "name": "WorkflowOutputWildcard",
                "attributes": {"fqn": terminal("fqn", "t.y"), "wildcard": Value::Null}
            }
        ]}
    });
    let tree = parse(document(vec![
        t_task(),
        workflow("w", vec![call("t", vec![]), outputs]),
    ]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let wf = as_json(&converted.documents[1]);

    assert_eq!(
        wf["outputs"],
        json!([{"id": "y", "outputSource": "#w/t/y"}])
    );
}

#[test]
fn wildcard_output_expands_every_step_output() {
    let outputs = json!({
        "name": "WorkflowOutputs",
        "attributes": {"outputs": [
            {
                "name": "WorkflowOutputWildcard",
                "attributes": {"fqn": terminal("fqn", "t"), "wildcard": terminal("asterisk", "*")}
            }
        ]}
    });
    let tree = parse(document(vec![
        t_task(),
        workflow("w", vec![call("t", vec![]), outputs]),
    ]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let wf = as_json(&converted.documents[1]);

    assert_eq!(
        wf["outputs"],
        json!([{"id": "t_y", "type": "File", "outputSource": "#t/y"}])
    );
}

#[test]
fn stdout_capture_output() {
    let read_int_of_stdout = json!({
        "name": "FunctionCall",
        "attributes": {
            "name": terminal("identifier", "read_int"),
            "params": [{
                "name": "FunctionCall",
                "attributes": {
                    "name": terminal("identifier", "stdout"),
                    "params": []
                }
            }]
        }
    });
    let task = json!({
        "name": "Task",
        "attributes": {
            "name": terminal("identifier", "count"),
            "declarations": [],
            "sections": [
                {
                    "name": "RawCommand",
                    "attributes": {"parts": [terminal("cmd_part", "wc -l < input.txt")]}
                },
                {
                    "name": "Outputs",
                    "attributes": {"attributes": [{
                        "name": "Output",
                        "attributes": {
                            "name": terminal("identifier", "n"),
                            "type": terminal("type", "Int"),
                            "expression": read_int_of_stdout
                        }
                    }]}
                }
            ]
        }
    });
    let tree = parse(document(vec![task]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let tool = as_json(&converted.documents[0]);

    assert_eq!(tool["stdout"], "__stdout");
    let binding = &tool["outputs"][0]["outputBinding"];
    assert_eq!(binding["glob"], "__stdout");
    assert_eq!(binding["loadContents"], true);
    assert_eq!(binding["outputEval"], "$(parseInt(self[0].contents))");
}

#[test]
fn read_tsv_declaration_emits_expression_tool_artifact() {
    let read_tsv = json!({
        "name": "FunctionCall",
        "attributes": {
            "name": terminal("identifier", "read_tsv"),
            "params": [terminal("identifier", "sheet")]
        }
    });
    let tree = parse(document(vec![
        t_task(),
        workflow(
            "w",
            vec![
                declaration("sheet", "File", Value::Null),
                declaration("table", "String", read_tsv),
                call("t", vec![]),
            ],
        ),
    ]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let wf = as_json(&converted.documents[1]);

    assert_eq!(wf["steps"][0]["id"], "read_tsv_1");
    assert_eq!(wf["steps"][0]["run"], "read_tsv.cwl");
    assert_eq!(wf["steps"][0]["in"], json!([{"id": "infile", "source": "sheet"}]));
    assert_eq!(converted.expression_tools.len(), 1);
    assert_eq!(converted.expression_tools[0].template, "read_tsv.cwl");
}

#[test]
fn multiplied_sum_default_keeps_its_grouping() {
    let shifted = json!({
        "name": "Add",
        "attributes": {
            "lhs": terminal("identifier", "k"),
            "rhs": terminal("integer", "1")
        }
    });
    let product = json!({
        "name": "Multiply",
        "attributes": {"lhs": terminal("identifier", "n"), "rhs": shifted}
    });
    let task = json!({
        "name": "Task",
        "attributes": {
            "name": terminal("identifier", "scale"),
            "declarations": [
                declaration("n", "Int", Value::Null),
                declaration("k", "Int", Value::Null),
                declaration("m", "Int", product)
            ],
            "sections": [
                {
                    "name": "RawCommand",
                    "attributes": {"parts": [terminal("cmd_part", "true")]}
                }
            ]
        }
    });
    let tree = parse(document(vec![task]));
    let converted = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let tool = as_json(&converted.documents[0]);

    assert_eq!(tool["inputs"][2]["default"], "$(inputs.n * (inputs.k + 1))");
}

#[test]
fn imports_fail_the_whole_document() {
    let tree = parse(json!({
        "name": "Document",
        "attributes": {
            "imports": [{"name": "Import", "attributes": {"uri": terminal("string", "lib.wdl")}}],
            "definitions": [t_task()]
        }
    }));
    assert!(convert_document(&tree, WdlVersion::Draft2).is_err());
}

#[test]
fn conversion_is_idempotent() {
    let tree = parse(document(vec![
        t_task(),
        echo_task("echo_file"),
        workflow("w", vec![call("t", vec![]), call("echo_file", vec![])]),
    ]));
    let first = convert_document(&tree, WdlVersion::Draft2).unwrap();
    let second = convert_document(&tree, WdlVersion::Draft2).unwrap();

    let first_json: Vec<Value> = first.documents.iter().map(as_json).collect();
    let second_json: Vec<Value> = second.documents.iter().map(as_json).collect();
    assert_eq!(first_json, second_json);
}
