//! Script execution: a per-run Lua sandbox, the modeling API it exposes and
//! the console that collects script output.

mod bindings;
mod console;
mod sandbox;

use mlua::{Lua, Result as LuaResult, Table};

pub use bindings::BasicModeling;
pub use console::Console;
pub use sandbox::{ErrorKind, ErrorReport, ScriptResult, ScriptSandbox, API_BINDING, ENTRY_POINT};

/// Capability object injected into every script run.
///
/// The sandbox binds the returned table as [`API_BINDING`] and never looks
/// inside it.
pub trait ModelingApi {
    fn build<'lua>(&self, lua: &'lua Lua) -> LuaResult<Table<'lua>>;
}

impl<T> ModelingApi for std::sync::Arc<T>
where
    T: ModelingApi + ?Sized,
{
    fn build<'lua>(&self, lua: &'lua Lua) -> LuaResult<Table<'lua>> {
        (**self).build(lua)
    }
}
