//! String, regular expression and JSON functions

use super::{all_of, int_arg, is_type, str_arg, Builtin, FunctionContext, FunctionRegistry};
use crate::catalog::{DataType, Value};
use crate::executor::{ExecutorError, ExecutorResult};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.scalar(Builtin::new("concat", 1, None, all_strings, concat));
    registry.scalar(Builtin::exact("length", 1, string_to_integer, length));
    registry.scalar(Builtin::exact("lower", 1, all_strings, lower));
    registry.scalar(Builtin::exact("upper", 1, all_strings, upper));
    registry.scalar(Builtin::exact("left", 2, string_and_count, left));
    registry.scalar(Builtin::exact("right", 2, string_and_count, right));
    registry.scalar(Builtin::new("substr", 2, Some(3), check_substr, substr));

    registry.scalar(
        Builtin::exact("regexp_match", 2, check_regexp_match, regexp_match).literal_args(&[1]),
    );
    registry.scalar(
        Builtin::exact("regexp_extract", 2, all_strings, regexp_extract)
            .literal_args(&[1])
            .nullable(),
    );
    registry.scalar(
        Builtin::exact("regexp_replace", 3, all_strings, regexp_replace).literal_args(&[1, 2]),
    );

    registry.scalar(
        Builtin::exact("json_extract", 2, all_strings, json_extract)
            .literal_args(&[1])
            .nullable(),
    );
    registry.scalar(
        Builtin::exact("json_extract_scalar", 2, all_strings, json_extract_scalar)
            .literal_args(&[1])
            .nullable(),
    );
}

// ============ Type rules ============

fn all_strings(args: &[DataType]) -> Result<DataType, String> {
    all_of(args, DataType::String).map(|_| DataType::String)
}

fn string_to_integer(args: &[DataType]) -> Result<DataType, String> {
    all_of(args, DataType::String).map(|_| DataType::Integer)
}

fn check_regexp_match(args: &[DataType]) -> Result<DataType, String> {
    all_of(args, DataType::String).map(|_| DataType::Boolean)
}

fn string_and_count(args: &[DataType]) -> Result<DataType, String> {
    if !is_type(args[0], DataType::String) {
        return Err(format!("expected STRING, got {}", args[0]));
    }
    if !is_type(args[1], DataType::Integer) {
        return Err(format!("expected INTEGER length, got {}", args[1]));
    }
    Ok(DataType::String)
}

fn check_substr(args: &[DataType]) -> Result<DataType, String> {
    if !is_type(args[0], DataType::String) {
        return Err(format!("expected STRING, got {}", args[0]));
    }
    match args[1..].iter().find(|t| !is_type(**t, DataType::Integer)) {
        Some(bad) => Err(format!("expected INTEGER position, got {}", bad)),
        None => Ok(DataType::String),
    }
}

// ============ Plain strings ============

fn concat(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(str_arg("concat", arg)?);
    }
    Ok(Value::String(out))
}

fn length(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("length", &args[0])?;
    Ok(Value::Integer(s.chars().count() as i64))
}

fn lower(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::String(str_arg("lower", &args[0])?.to_lowercase()))
}

fn upper(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::String(str_arg("upper", &args[0])?.to_uppercase()))
}

/// Character count argument, clamped at zero
fn char_count(name: &str, v: &Value) -> ExecutorResult<usize> {
    Ok(usize::try_from(int_arg(name, v)?).unwrap_or(0))
}

fn left(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("left", &args[0])?;
    let n = char_count("left", &args[1])?;
    Ok(Value::String(s.chars().take(n).collect()))
}

fn right(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("right", &args[0])?;
    let n = char_count("right", &args[1])?;
    let len = s.chars().count();
    Ok(Value::String(s.chars().skip(len.saturating_sub(n)).collect()))
}

/// SUBSTR(s, start[, len]) with a 1-based start; a non-positive start counts from 1
fn substr(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("substr", &args[0])?;
    let start = int_arg("substr", &args[1])?;
    let skip = usize::try_from(start.saturating_sub(1)).unwrap_or(0);
    let chars = s.chars().skip(skip);
    let out: String = match args.get(2) {
        Some(len) => chars.take(char_count("substr", len)?).collect(),
        None => chars.collect(),
    };
    Ok(Value::String(out))
}

// ============ Regular expressions ============

fn regexp_match(args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("regexp_match", &args[0])?;
    let re = ctx.regex("regexp_match", str_arg("regexp_match", &args[1])?)?;
    Ok(Value::Boolean(re.is_match(s)))
}

fn regexp_extract(args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("regexp_extract", &args[0])?;
    let re = ctx.regex("regexp_extract", str_arg("regexp_extract", &args[1])?)?;
    if re.captures_len() != 2 {
        return Err(ExecutorError::function(
            "regexp_extract",
            "pattern must have exactly one capturing group",
        ));
    }
    Ok(re
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| Value::String(m.as_str().to_string()))
        .unwrap_or(Value::Null))
}

fn regexp_replace(args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    let s = str_arg("regexp_replace", &args[0])?;
    let re = ctx.regex("regexp_replace", str_arg("regexp_replace", &args[1])?)?;
    let replacement = str_arg("regexp_replace", &args[2])?;
    Ok(Value::String(re.replace_all(s, replacement).into_owned()))
}

// ============ JSON ============

#[derive(Debug, PartialEq)]
enum PathStep {
    Key(String),
    Index(usize),
}

/// Parse a JSONPath of the form `$`, `$.a.b`, `$.a[0]`, `$['a']`
fn parse_json_path(name: &str, path: &str) -> ExecutorResult<Vec<PathStep>> {
    let invalid = |msg: &str| ExecutorError::function(name, format!("invalid JSON path '{}': {}", path, msg));
    let rest = path
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| invalid("must start with '$'"))?;
    let chars: Vec<char> = rest.chars().collect();
    let mut steps = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                    end += 1;
                }
                if end == start {
                    return Err(invalid("empty property name"));
                }
                steps.push(PathStep::Key(chars[start..end].iter().collect()));
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| invalid("unclosed '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                let quoted = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                match quoted {
                    Some(key) => steps.push(PathStep::Key(key.to_string())),
                    None => {
                        let index = inner
                            .parse::<usize>()
                            .map_err(|_| invalid("array index must be a non-negative integer"))?;
                        steps.push(PathStep::Index(index));
                    }
                }
                i = close + 1;
            }
            c => return Err(invalid(&format!("unexpected character '{}'", c))),
        }
    }
    Ok(steps)
}

/// Follow a path into a JSON document; None when any step is missing
fn extract_json(name: &str, args: &[Value]) -> ExecutorResult<Option<serde_json::Value>> {
    let text = str_arg(name, &args[0])?;
    let steps = parse_json_path(name, str_arg(name, &args[1])?)?;
    let Ok(document) = serde_json::from_str::<serde_json::Value>(text) else {
        return Ok(None);
    };
    let mut current = &document;
    for step in &steps {
        let next = match step {
            PathStep::Key(key) => current.get(key.as_str()),
            PathStep::Index(index) => current.get(*index),
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    Ok(Some(current.clone()))
}

fn json_extract(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(match extract_json("json_extract", args)? {
        Some(found) => Value::String(found.to_string()),
        None => Value::Null,
    })
}

fn json_extract_scalar(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(match extract_json("json_extract_scalar", args)? {
        Some(serde_json::Value::String(s)) => Value::String(s),
        Some(serde_json::Value::Number(n)) => Value::String(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Value::String(b.to_string()),
        _ => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::tests::{call, check, ctx};

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn test_basic_strings() {
        assert_eq!(call("concat", &[s("ab"), s("cd"), s("e")]), Ok(s("abcde")));
        assert_eq!(call("length", &[s("héllo")]), Ok(Value::Integer(5)));
        assert_eq!(call("upper", &[s("abc")]), Ok(s("ABC")));
        assert!(check("concat", &[DataType::String, DataType::Integer]).is_err());
    }

    #[test]
    fn test_left_right_substr() {
        assert_eq!(call("left", &[s("hello"), Value::Integer(2)]), Ok(s("he")));
        assert_eq!(call("left", &[s("hi"), Value::Integer(10)]), Ok(s("hi")));
        assert_eq!(call("right", &[s("hello"), Value::Integer(3)]), Ok(s("llo")));
        assert_eq!(call("substr", &[s("hello"), Value::Integer(2)]), Ok(s("ello")));
        assert_eq!(
            call("substr", &[s("hello"), Value::Integer(2), Value::Integer(3)]),
            Ok(s("ell"))
        );
    }

    #[test]
    fn test_regexp() {
        assert_eq!(
            call("regexp_match", &[s("abc123"), s(r"\d+")]),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            call("regexp_extract", &[s("key=value"), s(r"=(\w+)")]),
            Ok(s("value"))
        );
        assert_eq!(
            call("regexp_extract", &[s("nothing"), s(r"=(\w+)")]),
            Ok(Value::Null)
        );
        assert!(call("regexp_extract", &[s("a"), s("a")]).is_err());
        assert_eq!(
            call("regexp_replace", &[s("a-b-c"), s("-"), s("+")]),
            Ok(s("a+b+c"))
        );
        assert!(matches!(
            call("regexp_match", &[s("a"), s("(")]),
            Err(ExecutorError::Function { .. })
        ));
    }

    #[test]
    fn test_patterns_cached_per_context() {
        let first = ctx();
        for text in ["a1", "b2", "c"] {
            regexp_match(&[s(text), s(r"\d")], &first).unwrap();
        }
        regexp_replace(&[s("x"), s("x+"), s("y")], &first).unwrap();
        assert_eq!(first.compiled_patterns(), 2);

        let second = ctx();
        assert_eq!(second.compiled_patterns(), 0);
        assert_eq!(
            regexp_match(&[s("a1"), s(r"\d")], &second),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_json_path_parsing() {
        assert_eq!(
            parse_json_path("f", "$.a[1]['b c']").unwrap(),
            vec![
                PathStep::Key("a".to_string()),
                PathStep::Index(1),
                PathStep::Key("b c".to_string())
            ]
        );
        assert!(parse_json_path("f", "a.b").is_err());
        assert!(parse_json_path("f", "$.").is_err());
        assert!(parse_json_path("f", "$[1").is_err());
    }

    #[test]
    fn test_json_extract() {
        let doc = s(r#"{"a": {"b": [1, "two", null]}, "c": "x"}"#);
        assert_eq!(
            call("json_extract", &[doc.clone(), s("$.a.b")]),
            Ok(s(r#"[1,"two",null]"#))
        );
        assert_eq!(call("json_extract", &[doc.clone(), s("$.c")]), Ok(s(r#""x""#)));
        assert_eq!(call("json_extract", &[doc.clone(), s("$.zzz")]), Ok(Value::Null));
        assert_eq!(call("json_extract_scalar", &[doc.clone(), s("$.c")]), Ok(s("x")));
        assert_eq!(call("json_extract_scalar", &[doc.clone(), s("$.a.b[0]")]), Ok(s("1")));
        assert_eq!(call("json_extract_scalar", &[doc.clone(), s("$.a")]), Ok(Value::Null));
        assert_eq!(call("json_extract_scalar", &[doc, s("$.a.b[2]")]), Ok(Value::Null));
    }
}
