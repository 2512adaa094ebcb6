/*
 * render_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Behavioral tests for compiling and rendering each block family.
 */

use pretty_assertions::assert_eq;
use textweave::{Context, Template, TemplateError, TemplateResult, Value};

fn render(source: &str, context: Context) -> TemplateResult<String> {
    Template::compile(source)?.render_with(context)
}

fn render_empty(source: &str) -> TemplateResult<String> {
    render(source, Context::new())
}

fn json_context(value: serde_json::Value) -> Context {
    Context::from_json(value).expect("test context must be a JSON object")
}

fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

// ============================================================================
// Literal text
// ============================================================================

#[test]
fn test_text_basic() {
    assert_eq!(render_empty("Hello !").unwrap(), "Hello !");
}

#[test]
fn test_text_single_character() {
    assert_eq!(render_empty("H").unwrap(), "H");
}

#[test]
fn test_no_template_renders_empty() {
    assert_eq!(Template::new().render().unwrap(), "");
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_expression_string_literal() {
    assert_eq!(render_empty("{{'Hello !'}}").unwrap(), "Hello !");
}

#[test]
fn test_expression_map_literal_member() {
    assert_eq!(render_empty("{{{text: 'Hello !'}.text}}").unwrap(), "Hello !");
}

#[test]
fn test_expression_multiline_script() {
    assert_eq!(
        render_empty("{{const text = 'Hello !';\nreturn text;}}").unwrap(),
        "Hello !"
    );
}

#[test]
fn test_expression_multiline_script_without_semicolons() {
    assert_eq!(
        render_empty("{{const text = 'Hello !'\nreturn text}}").unwrap(),
        "Hello !"
    );
}

#[test]
fn test_expression_inline_script() {
    assert_eq!(
        render_empty("{{const text = 'Hello !';return text}}").unwrap(),
        "Hello !"
    );
}

#[test]
fn test_expression_evaluation_error() {
    let err = render_empty("{{null.hello}}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "evaluation failed in 'return null.hello;': cannot read property 'hello' of null"
    );
}

#[test]
fn test_expression_missing_delimiters() {
    assert_eq!(
        render_empty("}}").unwrap_err().to_string(),
        "missing delimiter: '{{'"
    );
    assert_eq!(
        render_empty("{{").unwrap_err().to_string(),
        "missing delimiter: '}}'"
    );
    assert_eq!(
        render_empty("{{}}Hello{{").unwrap_err().to_string(),
        "missing delimiter: '}}'"
    );
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_statement_missing_delimiters() {
    assert_eq!(
        render_empty("%}").unwrap_err().to_string(),
        "missing delimiter: '{%'"
    );
    assert_eq!(
        render_empty("{%").unwrap_err().to_string(),
        "missing delimiter: '%}'"
    );
}

#[test]
fn test_statement_unknown_keyword() {
    assert_eq!(
        render_empty("{%hello%}").unwrap_err().to_string(),
        "unknown statement: 'hello'"
    );
}

#[test]
fn test_statement_whitespace_insensitive() {
    assert_eq!(
        render_empty(
            "{%       if            true           %}Hello !{%           endif                               %}"
        )
        .unwrap(),
        "Hello !"
    );
}

// ============================================================================
// Conditionals
// ============================================================================

#[test]
fn test_if_true() {
    let source = "{%if bool%}Hello !{%endif%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": true}))).unwrap(),
        "Hello !"
    );
}

#[test]
fn test_if_false() {
    let source = "{%if bool%}Hello !{%endif%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": false}))).unwrap(),
        ""
    );
}

#[test]
fn test_if_nested_same_kind() {
    let source = "{%if bool%}{%if bool%}Hello !{%endif%}{%endif%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": true}))).unwrap(),
        "Hello !"
    );
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": false}))).unwrap(),
        ""
    );
}

#[test]
fn test_else_branches() {
    let source = "{%if bool%}Hello !{%else%}Goodbye !{%endif%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": true}))).unwrap(),
        "Hello !"
    );
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": false}))).unwrap(),
        "Goodbye !"
    );
}

#[test]
fn test_if_nested_in_else() {
    let source = "{%if bool%}Hello !{%else%}{%if !bool%}Goodbye !{%endif%}{%endif%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": false}))).unwrap(),
        "Goodbye !"
    );
}

#[test]
fn test_elseif_branches() {
    let source = "{%if bool%}Hello !{%elseif !bool%}Goodbye !{%endif%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": true}))).unwrap(),
        "Hello !"
    );
    assert_eq!(
        render(source, json_context(serde_json::json!({"bool": false}))).unwrap(),
        "Goodbye !"
    );
}

#[test]
fn test_conditional_structure_errors() {
    assert_eq!(
        render_empty("{%endif%}").unwrap_err().to_string(),
        "missing statement: 'if'"
    );
    assert_eq!(
        render_empty("{%elseif%}").unwrap_err().to_string(),
        "missing statement: 'if'"
    );
    assert_eq!(
        render_empty("{%else%}").unwrap_err().to_string(),
        "missing statement: 'if'"
    );
    assert_eq!(
        render_empty("{%if bool%}").unwrap_err().to_string(),
        "missing statement: 'endif'"
    );
    assert_eq!(
        render_empty("{%if%}{%else%}{%elseif%}{%endif%}")
            .unwrap_err()
            .to_string(),
        "invalid statement: 'else' must be the last element of 'if'"
    );
    assert_eq!(
        render_empty("{%if%}{%else%}{%else%}{%endif%}")
            .unwrap_err()
            .to_string(),
        "invalid statement: duplicate 'else' in 'if'"
    );
}

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn test_foreach_concatenates_in_order() {
    let mut context = Context::new();
    context.insert("array", strings(&["He", "ll", "o !"]));
    assert_eq!(
        render("{%foreach item in array%}{{item}}{%endforeach%}", context).unwrap(),
        "Hello !"
    );
}

#[test]
fn test_foreach_default_index_binding() {
    let mut context = Context::new();
    context.insert("array", strings(&["He", "ll", "o !"]));
    assert_eq!(
        render(
            "{%foreach item in array%}{{array[index]}}{%endforeach%}",
            context
        )
        .unwrap(),
        "Hello !"
    );
}

#[test]
fn test_foreach_renamed_index_binding() {
    let mut context = Context::new();
    context.insert("array", strings(&["He", "ll", "o !"]));
    assert_eq!(
        render(
            "{%foreach item, hello in array%}{{array[hello]}}{%endforeach%}",
            context
        )
        .unwrap(),
        "Hello !"
    );
}

#[test]
fn test_foreach_nested() {
    let context = json_context(serde_json::json!({
        "array": [["He"], ["ll", "o !"], []],
    }));
    assert_eq!(
        render(
            "{%foreach subArray in array%}{%foreach item in subArray%}{{item}}{%endforeach%}{%endforeach%}",
            context
        )
        .unwrap(),
        "Hello !"
    );
}

#[test]
fn test_foreach_subject_must_be_a_list() {
    let mut context = Context::new();
    context.insert("array", "Hello !");
    assert_eq!(
        render("{%foreach item in array%}{{item}}{%endforeach%}", context)
            .unwrap_err()
            .to_string(),
        "incompatible argument: 'return array;' is not a list"
    );
}

#[test]
fn test_foreach_structure_errors() {
    assert_eq!(
        render_empty("{%endforeach%}").unwrap_err().to_string(),
        "missing statement: 'foreach'"
    );
    assert_eq!(
        render_empty("{%foreach item in array%}")
            .unwrap_err()
            .to_string(),
        "missing statement: 'endforeach'"
    );
}

// ============================================================================
// Multi-way branches
// ============================================================================

const SWITCH_BASIC: &str =
    "{%switch hello%}{%case 1%}Hello !{%case 2%}Goodbye !{%default%}Hi !{%endswitch%}";

#[test]
fn test_switch_matches_first_case() {
    assert_eq!(
        render(SWITCH_BASIC, json_context(serde_json::json!({"hello": 1}))).unwrap(),
        "Hello !"
    );
}

#[test]
fn test_switch_matches_second_case() {
    assert_eq!(
        render(SWITCH_BASIC, json_context(serde_json::json!({"hello": 2}))).unwrap(),
        "Goodbye !"
    );
}

#[test]
fn test_switch_falls_back_to_default() {
    assert_eq!(
        render(SWITCH_BASIC, json_context(serde_json::json!({"hello": 3}))).unwrap(),
        "Hi !"
    );
}

#[test]
fn test_switch_without_default_renders_empty() {
    let source = "{%switch hello%}{%case 1%}Hello !{%case 2%}Goodbye !{%endswitch%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"hello": 3}))).unwrap(),
        ""
    );
}

#[test]
fn test_switch_string_cases() {
    let source = "{%switch hello%}{%case 'hello'%}Hello !{%case 'goodbye'%}Goodbye !{%endswitch%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"hello": "goodbye"}))).unwrap(),
        "Goodbye !"
    );
}

#[test]
fn test_switch_cases_match_by_evaluated_value() {
    let source =
        "{%switch hello%}{%case helloCase%}Hello !{%case goodbyeCase%}Goodbye !{%endswitch%}";
    let context = json_context(serde_json::json!({
        "hello": "goodbye",
        "helloCase": "hello",
        "goodbyeCase": "goodbye",
    }));
    assert_eq!(render(source, context).unwrap(), "Goodbye !");
}

#[test]
fn test_switch_nested_without_cases_renders_body_as_default() {
    let source =
        "{%switch hello%}{%case 1%}{%switch%}Hello !{%endswitch%}{%case 2%}Goodbye !{%endswitch%}";
    assert_eq!(
        render(source, json_context(serde_json::json!({"hello": 1}))).unwrap(),
        "Hello !"
    );
}

#[test]
fn test_switch_structure_errors() {
    assert_eq!(
        render_empty("{%endswitch%}").unwrap_err().to_string(),
        "missing statement: 'switch'"
    );
    assert_eq!(
        render_empty("{%case%}").unwrap_err().to_string(),
        "missing statement: 'switch'"
    );
    assert_eq!(
        render_empty("{%default%}").unwrap_err().to_string(),
        "missing statement: 'switch'"
    );
    assert_eq!(
        render_empty("{%switch%}").unwrap_err().to_string(),
        "missing statement: 'endswitch'"
    );
    assert_eq!(
        render_empty("{%switch%}{%default%}{%case%}{%endswitch%}")
            .unwrap_err()
            .to_string(),
        "invalid statement: 'default' must be the last element of 'switch'"
    );
    assert_eq!(
        render_empty("{%switch%}{%default%}{%default%}{%endswitch%}")
            .unwrap_err()
            .to_string(),
        "invalid statement: duplicate 'default' in 'switch'"
    );
}

// ============================================================================
// Mixed nesting
// ============================================================================

#[test]
fn test_if_in_foreach() {
    let context = json_context(serde_json::json!({"array": [true, false, true]}));
    assert_eq!(
        render(
            "{%foreach item in array%}{%if item%}Hello !{%endif%}{%endforeach%}",
            context
        )
        .unwrap(),
        "Hello !Hello !"
    );
}

#[test]
fn test_if_elseif_else_in_foreach() {
    let context = json_context(serde_json::json!({
        "array": [
            {"bool": true, "otherBool": true},
            {"bool": false, "otherBool": false},
            {"bool": false, "otherBool": true},
        ],
    }));
    let source = "{%foreach item in array%}{%if item.bool%}Hello !{%elseif item.otherBool%}Goodbye !{%else%}Hi !{%endif%}{%endforeach%}";
    assert_eq!(render(source, context).unwrap(), "Hello !Hi !Goodbye !");
}

#[test]
fn test_foreach_in_if() {
    let context = json_context(serde_json::json!({"array": [3, 1, 2]}));
    assert_eq!(
        render(
            "{%if array%}{%foreach item in array%}{{item}}{%endforeach%}{%endif%}",
            context
        )
        .unwrap(),
        "312"
    );
}

#[test]
fn test_switch_in_foreach() {
    let context = json_context(serde_json::json!({"array": [3, 2, 1]}));
    let source = "{%foreach item in array%}{%switch item%}{%case 1%}Hello !{%case 2%}Goodbye !{%default%}Hi !{%endswitch%}{%endforeach%}";
    assert_eq!(render(source, context).unwrap(), "Hi !Goodbye !Hello !");
}

// ============================================================================
// Context mutation across a render call
// ============================================================================

#[test]
fn test_script_blocks_accumulate_across_iterations() {
    let source = "{{context.total = 0;}}{%foreach item in [1, 2, 3]%}{{total += item;}}{%endforeach%}{{total}}";
    assert_eq!(render_empty(source).unwrap(), "6");
}

#[test]
fn test_error_mentions_not_a_list() {
    let mut context = Context::new();
    context.insert("array", 42);
    let err = render("{%foreach item in array%}{%endforeach%}", context).unwrap_err();
    assert!(matches!(err, TemplateError::NotAList { .. }));
}
