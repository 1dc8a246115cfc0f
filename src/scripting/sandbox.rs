use std::fmt;

use log::{debug, info, warn};
use mlua::{Function, Lua, MultiValue, Table, Value, Variadic};
use thiserror::Error;

use crate::geometry::{Solid, SolidCollection};

use super::bindings::{solid_from_value, solids_from_value};
use super::console::Console;
use super::ModelingApi;

/// Name of the function a script defines to produce its solids.
pub const ENTRY_POINT: &str = "main";

/// Global under which the injected modeling API is visible to scripts.
pub const API_BINDING: &str = "modeling";

const CHUNK_NAME: &str = "script";
const TRACEBACK_MARKER: &str = "\nstack traceback:";

/// Pure language builtins copied into each script environment.
const SAFE_GLOBALS: &[&str] = &[
    "math", "string", "table", "ipairs", "pairs", "next", "select", "type", "tostring",
    "tonumber", "assert", "error", "pcall",
];

/// Stage at which a script failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Compile,
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Compile => f.write_str("compile error"),
            ErrorKind::Runtime => f.write_str("runtime error"),
        }
    }
}

/// Failure of one script run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorReport {
    fn from_lua(kind: ErrorKind, err: mlua::Error) -> Self {
        let (message, stack) = describe(&err);
        Self {
            kind,
            message,
            stack,
        }
    }

    fn compile(err: mlua::Error) -> Self {
        Self::from_lua(ErrorKind::Compile, err)
    }

    fn runtime(err: mlua::Error) -> Self {
        Self::from_lua(ErrorKind::Runtime, err)
    }
}

fn describe(err: &mlua::Error) -> (String, Option<String>) {
    match err {
        mlua::Error::SyntaxError { message, .. } => split_traceback(message),
        mlua::Error::RuntimeError(message) => split_traceback(message),
        mlua::Error::CallbackError { traceback, cause } => {
            let (message, _) = describe(cause);
            (message, Some(traceback.clone()))
        }
        other => split_traceback(&other.to_string()),
    }
}

fn split_traceback(text: &str) -> (String, Option<String>) {
    match text.find(TRACEBACK_MARKER) {
        Some(index) => (
            text[..index].to_string(),
            Some(text[index + 1..].to_string()),
        ),
        None => (text.to_string(), None),
    }
}

/// Outcome of running a script: the solids it produced, or why it failed.
pub type ScriptResult = Result<SolidCollection, ErrorReport>;

/// Runs user scripts against an injected modeling API.
///
/// Every run gets a fresh Lua state whose environment contains only the API,
/// a console-backed `print` and a few pure builtins. Nothing survives between
/// runs. There is no timeout: a script that never returns blocks the caller.
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    console: Console,
}

impl ScriptSandbox {
    pub fn new(console: Console) -> Self {
        Self { console }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn run(&self, source: &str, api: &dyn ModelingApi) -> ScriptResult {
        let result = execute(source, api, &self.console);
        match &result {
            Ok(solids) => {
                info!("Generated {} solids", solids.len());
                self.console
                    .push(format!("Generated {} solids", solids.len()));
            }
            Err(report) => {
                warn!("script failed: {report}");
                self.console.push(format!("ERROR: {report}"));
            }
        }
        result
    }
}

fn execute(source: &str, api: &dyn ModelingApi, console: &Console) -> ScriptResult {
    let lua = Lua::new();
    let env = build_environment(&lua, api, console).map_err(ErrorReport::runtime)?;

    let chunk = lua
        .load(source)
        .set_name(CHUNK_NAME)
        .set_environment(env.clone())
        .into_function()
        .map_err(ErrorReport::compile)?;
    chunk.call::<_, ()>(()).map_err(ErrorReport::runtime)?;

    let main = match env.get::<_, Value>(ENTRY_POINT).map_err(ErrorReport::runtime)? {
        Value::Function(main) => main,
        _ => {
            debug!("script does not define {ENTRY_POINT}(); producing no solids");
            return Ok(SolidCollection::empty());
        }
    };
    let solids = call_entry_point(main).map_err(ErrorReport::runtime)?;
    Ok(SolidCollection::from(solids))
}

fn call_entry_point(main: Function) -> mlua::Result<Vec<Solid>> {
    let mut values = main.call::<_, MultiValue>(())?.into_vec();
    match values.len() {
        0 => Ok(Vec::new()),
        1 => solids_from_value(values.remove(0)),
        _ => values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                solid_from_value(value).map_err(|err| {
                    mlua::Error::RuntimeError(format!(
                        "return value {} is not a solid: {err}",
                        index + 1
                    ))
                })
            })
            .collect(),
    }
}

fn build_environment<'lua>(
    lua: &'lua Lua,
    api: &dyn ModelingApi,
    console: &Console,
) -> mlua::Result<Table<'lua>> {
    let env = lua.create_table()?;
    let globals = lua.globals();
    for name in SAFE_GLOBALS {
        env.set(*name, globals.get::<_, Value>(*name)?)?;
    }
    let table: Table = globals.get("table")?;
    env.set("unpack", table.get::<_, Value>("unpack")?)?;

    let print_console = console.clone();
    let print = lua.create_function(move |lua, values: Variadic<Value>| {
        let mut parts = Vec::with_capacity(values.len());
        for value in values.iter() {
            let text = match lua.coerce_string(value.clone())? {
                Some(text) => text.to_str()?.to_string(),
                None => match value {
                    Value::Nil => "nil".to_string(),
                    Value::Boolean(b) => b.to_string(),
                    other => other.type_name().to_string(),
                },
            };
            parts.push(text);
        }
        let line = parts.join("\t");
        info!("[Lua] {line}");
        print_console.push(line);
        Ok(())
    })?;
    env.set("print", print)?;

    env.set(API_BINDING, api.build(lua)?)?;
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::BasicModeling;
    use once_cell::sync::Lazy;

    static TRIANGLE_SCRIPT: Lazy<String> = Lazy::new(|| {
        r#"
        local function triangle(z)
            return { polygons = { { vertices = { {0, 0, z}, {1, 0, z}, {0, 1, z} } } } }
        end
        function main()
            return { triangle(0), triangle(1) }
        end
        "#
        .to_string()
    });

    fn run(source: &str) -> (ScriptResult, Console) {
        let sandbox = ScriptSandbox::new(Console::new());
        let result = sandbox.run(source, &BasicModeling);
        (result, sandbox.console().clone())
    }

    #[test]
    fn missing_entry_point_yields_empty_collection() {
        let (result, console) = run("local x = 1 + 1");
        assert!(result.unwrap().is_empty());
        assert_eq!(console.lines(), vec!["Generated 0 solids".to_string()]);
    }

    #[test]
    fn non_function_main_is_ignored() {
        let (result, _) = run("main = 42");
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn bare_solid_is_wrapped() {
        let (result, _) = run("function main() return modeling.primitives.cube({ size = 4 }) end");
        let solids = result.unwrap();
        assert_eq!(solids.len(), 1);
        assert_eq!(solids[0].polygon_count(), 6);
    }

    #[test]
    fn list_is_flattened_one_level() {
        let (result, _) = run(&TRIANGLE_SCRIPT);
        let solids = result.unwrap();
        assert_eq!(solids.len(), 2);
        assert_eq!(solids[1].polygons[0].vertices[0].0, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn nested_lists_are_not_flattened_further() {
        let source = "function main() local c = modeling.primitives.cube() return { c, { c } } end";
        let (result, _) = run(source);
        let report = result.unwrap_err();
        assert_eq!(report.kind, ErrorKind::Runtime);
        assert!(report.message.contains("item 2 is not a solid"));
    }

    #[test]
    fn multiple_return_values_form_a_list() {
        let source = "function main() local p = modeling.primitives return p.cube(), p.cylinder() end";
        let (result, _) = run(source);
        assert_eq!(result.unwrap().len(), 2);
    }

    #[test]
    fn nil_return_yields_empty_collection() {
        let (result, _) = run("function main() end");
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn syntax_errors_are_compile_errors() {
        let (result, console) = run("function main( return end");
        let report = result.unwrap_err();
        assert_eq!(report.kind, ErrorKind::Compile);
        assert!(console.text().starts_with("ERROR: compile error"));
    }

    #[test]
    fn thrown_errors_are_runtime_errors() {
        let (result, _) = run("function main() error('boom') end");
        let report = result.unwrap_err();
        assert_eq!(report.kind, ErrorKind::Runtime);
        assert!(report.message.contains("boom"));
        assert!(!report.message.contains("stack traceback"));
    }

    #[test]
    fn api_errors_surface_as_runtime_errors() {
        let source = "function main() return modeling.transforms.translate('left', modeling.primitives.cube()) end";
        let (result, _) = run(source);
        assert_eq!(result.unwrap_err().kind, ErrorKind::Runtime);
    }

    #[test]
    fn unbounded_primitive_arguments_are_runtime_errors() {
        let huge = "function main() return modeling.primitives.cylinder({ segments = math.huge }) end";
        let (result, console) = run(huge);
        let report = result.unwrap_err();
        assert_eq!(report.kind, ErrorKind::Runtime);
        assert!(report.message.contains("segments"));
        assert!(console.text().starts_with("ERROR: runtime error"));

        let bad_face = r#"
            function main()
                return modeling.primitives.polyhedron({
                    points = { {0, 0, 0}, {1, 0, 0}, {0, 1, 0} },
                    faces = { { math.mininteger, 2, 3 } },
                })
            end
        "#;
        let (result, _) = run(bad_face);
        assert_eq!(result.unwrap_err().kind, ErrorKind::Runtime);
    }

    #[test]
    fn print_goes_to_the_console() {
        let (result, console) = run("print('hello', 3, nil, true) function main() end");
        assert!(result.is_ok());
        assert_eq!(console.lines()[0], "hello\t3\tnil\ttrue");
    }

    #[test]
    fn host_libraries_are_not_reachable() {
        let source = r#"
            function main()
                assert(os == nil and io == nil and require == nil and load == nil and dofile == nil)
                assert(math.floor(2.5) == 2 and unpack ~= nil)
            end
        "#;
        let (result, _) = run(source);
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn runs_do_not_share_state() {
        let sandbox = ScriptSandbox::new(Console::new());
        let first = sandbox.run("counter = 1 function main() end", &BasicModeling);
        assert!(first.is_ok());
        let second = sandbox.run("function main() assert(counter == nil) end", &BasicModeling);
        assert!(second.is_ok(), "{second:?}");
    }
}
