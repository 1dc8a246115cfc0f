use std::f64::consts::TAU;

use glam::{DQuat, DVec3};
use mlua::{
    Lua, LuaSerdeExt, Result as LuaResult, Table, UserData, UserDataFields, Value, Variadic,
};

use crate::geometry::{Polygon, Solid, Vertex};

use super::ModelingApi;

const MIN_SEGMENTS: usize = 3;
const MAX_SEGMENTS: usize = 4096;

/// Built-in modeling API: primitive solids and rigid/scale transforms.
///
/// It does not provide boolean operations. Hosts with a CSG kernel supply
/// their own [`ModelingApi`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicModeling;

impl ModelingApi for BasicModeling {
    fn build<'lua>(&self, lua: &'lua Lua) -> LuaResult<Table<'lua>> {
        let api = lua.create_table()?;
        api.set("primitives", primitives_table(lua)?)?;
        api.set("transforms", transforms_table(lua)?)?;
        Ok(api)
    }
}

fn primitives_table(lua: &Lua) -> LuaResult<Table<'_>> {
    let table = lua.create_table()?;

    table.set(
        "cube",
        lua.create_function(|_, options: Option<Table>| {
            let size = option_value(&options, "size")?;
            let size = vec3_from_value(size, DVec3::splat(2.0))?;
            let center = vec3_from_value(option_value(&options, "center")?, DVec3::ZERO)?;
            Ok(LuaSolid(cuboid(center, size)))
        })?,
    )?;

    table.set(
        "cuboid",
        lua.create_function(|_, options: Option<Table>| {
            let size = vec3_from_value(option_value(&options, "size")?, DVec3::splat(2.0))?;
            let center = vec3_from_value(option_value(&options, "center")?, DVec3::ZERO)?;
            Ok(LuaSolid(cuboid(center, size)))
        })?,
    )?;

    table.set(
        "cylinder",
        lua.create_function(|_, options: Option<Table>| {
            let radius = number_option(&options, "radius", 1.0)?;
            let height = number_option(&options, "height", 2.0)?;
            let segments = segment_count(number_option(&options, "segments", 32.0)?)?;
            let center = vec3_from_value(option_value(&options, "center")?, DVec3::ZERO)?;
            Ok(LuaSolid(cylinder(center, radius, height, segments)))
        })?,
    )?;

    table.set(
        "polyhedron",
        lua.create_function(|_, options: Table| {
            let points = options
                .get::<_, Table>("points")?
                .sequence_values::<Value>()
                .map(|value| vec3_from_value(value?, DVec3::ZERO))
                .collect::<LuaResult<Vec<_>>>()?;
            let faces = options
                .get::<_, Table>("faces")?
                .sequence_values::<Table>()
                .map(|face| face_points(&face?, &points))
                .collect::<LuaResult<Vec<_>>>()?;
            let polygons = faces
                .iter()
                .map(|face| Polygon::from_points(face))
                .collect();
            Ok(LuaSolid(Solid::new(polygons)))
        })?,
    )?;

    Ok(table)
}

fn transforms_table(lua: &Lua) -> LuaResult<Table<'_>> {
    let table = lua.create_table()?;

    table.set(
        "translate",
        lua.create_function(|lua, (offset, shapes): (Value, Variadic<Value>)| {
            let offset = vec3_from_value(offset, DVec3::ZERO)?;
            map_solids(lua, shapes, move |point| point + offset)
        })?,
    )?;

    table.set(
        "scale",
        lua.create_function(|lua, (factors, shapes): (Value, Variadic<Value>)| {
            let factors = vec3_from_value(factors, DVec3::ONE)?;
            map_solids(lua, shapes, move |point| point * factors)
        })?,
    )?;

    let axes = [
        ("rotateX", DVec3::X),
        ("rotateY", DVec3::Y),
        ("rotateZ", DVec3::Z),
    ];
    for (name, axis) in axes {
        table.set(
            name,
            lua.create_function(move |lua, (angle, shapes): (f64, Variadic<Value>)| {
                let rotation = DQuat::from_axis_angle(axis, angle);
                map_solids(lua, shapes, move |point| rotation * point)
            })?,
        )?;
    }

    Ok(table)
}

fn map_solids<'lua>(
    lua: &'lua Lua,
    shapes: Variadic<Value<'lua>>,
    transform: impl Fn(DVec3) -> DVec3 + Copy,
) -> LuaResult<Value<'lua>> {
    let mut solids = Vec::new();
    for shape in shapes {
        solids.extend(solids_from_value(shape)?);
    }
    let transformed = solids
        .iter()
        .map(|solid| solid.map_points(transform))
        .collect();
    solids_into_lua(lua, transformed)
}

/// Returns a single solid as-is and several as a list.
fn solids_into_lua(lua: &Lua, mut solids: Vec<Solid>) -> LuaResult<Value<'_>> {
    if solids.len() == 1 {
        let solid = solids.remove(0);
        return Ok(Value::UserData(lua.create_userdata(LuaSolid(solid))?));
    }
    let list = lua.create_table_with_capacity(solids.len(), 0)?;
    for (index, solid) in solids.into_iter().enumerate() {
        list.set(index + 1, LuaSolid(solid))?;
    }
    Ok(Value::Table(list))
}

fn cuboid(center: DVec3, size: DVec3) -> Solid {
    let h = size * 0.5;
    let corner = |sx: f64, sy: f64, sz: f64| center + DVec3::new(sx * h.x, sy * h.y, sz * h.z);
    let faces = [
        [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
        [(1., -1., -1.), (1., 1., -1.), (1., 1., 1.), (1., -1., 1.)],
        [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
        [(-1., 1., -1.), (-1., 1., 1.), (1., 1., 1.), (1., 1., -1.)],
        [(-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.), (1., -1., -1.)],
        [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
    ];
    let polygons = faces
        .iter()
        .map(|face| {
            let points: Vec<DVec3> = face.iter().map(|&(x, y, z)| corner(x, y, z)).collect();
            Polygon::from_points(&points)
        })
        .collect();
    Solid::new(polygons)
}

fn cylinder(center: DVec3, radius: f64, height: f64, segments: usize) -> Solid {
    let half = height * 0.5;
    let ring = |z: f64| -> Vec<DVec3> {
        (0..segments)
            .map(|i| {
                let (sin, cos) = (TAU * i as f64 / segments as f64).sin_cos();
                center + DVec3::new(radius * cos, radius * sin, z)
            })
            .collect()
    };
    let bottom = ring(-half);
    let top = ring(half);

    let mut polygons = Vec::with_capacity(segments + 2);
    for i in 0..segments {
        let j = (i + 1) % segments;
        polygons.push(Polygon::from_points(&[bottom[i], bottom[j], top[j], top[i]]));
    }
    polygons.push(Polygon::from_points(&top));
    let reversed: Vec<DVec3> = bottom.iter().rev().copied().collect();
    polygons.push(Polygon::from_points(&reversed));
    Solid::new(polygons)
}

fn segment_count(value: f64) -> LuaResult<usize> {
    if !value.is_finite() || value > MAX_SEGMENTS as f64 {
        return Err(mlua::Error::RuntimeError(format!(
            "segments must be a finite number no greater than {MAX_SEGMENTS}, got {value}"
        )));
    }
    Ok((value as usize).max(MIN_SEGMENTS))
}

fn face_points(face: &Table, points: &[DVec3]) -> LuaResult<Vec<DVec3>> {
    face.clone()
        .sequence_values::<i64>()
        .map(|index| {
            let index = index?;
            index
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| points.get(i).copied())
                .ok_or_else(|| {
                    mlua::Error::RuntimeError(format!("face references missing point {index}"))
                })
        })
        .collect()
}

fn option_value<'lua>(options: &Option<Table<'lua>>, key: &str) -> LuaResult<Value<'lua>> {
    match options {
        Some(table) => table.get(key),
        None => Ok(Value::Nil),
    }
}

fn number_option(options: &Option<Table>, key: &str, default: f64) -> LuaResult<f64> {
    match options {
        Some(table) => Ok(table.get::<_, Option<f64>>(key)?.unwrap_or(default)),
        None => Ok(default),
    }
}

/// Reads a vector from a number (splatted), `{x, y, z}` or `{x = .., y = .., z = ..}`.
fn vec3_from_value(value: Value, default: DVec3) -> LuaResult<DVec3> {
    match value {
        Value::Nil => Ok(default),
        Value::Integer(n) => Ok(DVec3::splat(n as f64)),
        Value::Number(n) => Ok(DVec3::splat(n)),
        Value::Table(table) => Ok(DVec3::new(
            table_component(&table, "x", 1)?,
            table_component(&table, "y", 2)?,
            table_component(&table, "z", 3)?,
        )),
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "vector",
            message: Some("expected a number or a table of three numbers".into()),
        }),
    }
}

fn table_component(table: &Table, key: &str, index: i64) -> LuaResult<f64> {
    if let Ok(value) = table.get::<_, f64>(key) {
        return Ok(value);
    }
    table.get::<_, f64>(index)
}

/// Solid handed to scripts as userdata.
#[derive(Debug, Clone)]
pub(crate) struct LuaSolid(pub Solid);

impl UserData for LuaSolid {
    fn add_fields<'lua, F: UserDataFields<'lua, Self>>(fields: &mut F) {
        fields.add_field_method_get("polygonCount", |_, this| Ok(this.0.polygon_count()));
        // Plain-table copy; scripts may edit it and return it as a solid.
        fields.add_field_method_get("polygons", |lua, this| lua.to_value(&this.0.polygons));
    }
}

/// Converts a script value into solids.
///
/// `nil` is nothing, a solid is one element and any other table is treated
/// as a list whose items must each be a solid.
pub(crate) fn solids_from_value(value: Value) -> LuaResult<Vec<Solid>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::Table(table) if !is_solid_table(&table)? => table
            .sequence_values::<Value>()
            .enumerate()
            .map(|(index, item)| {
                item.and_then(solid_from_value).map_err(|err| {
                    mlua::Error::RuntimeError(format!("item {} is not a solid: {err}", index + 1))
                })
            })
            .collect(),
        other => Ok(vec![solid_from_value(other)?]),
    }
}

/// Converts one script value (userdata or plain table form) into a [`Solid`].
pub(crate) fn solid_from_value(value: Value) -> LuaResult<Solid> {
    match value {
        Value::UserData(ud) => ud.borrow::<LuaSolid>().map(|solid| solid.0.clone()),
        Value::Table(table) if is_solid_table(&table)? => {
            let polygons = table
                .get::<_, Table>("polygons")?
                .sequence_values::<Value>()
                .filter_map(|item| match item {
                    Ok(Value::Table(polygon)) => Some(polygon_from_table(&polygon)),
                    Ok(_) => None,
                    Err(err) => Some(Err(err)),
                })
                .collect::<LuaResult<Vec<_>>>()?;
            Ok(Solid::new(polygons))
        }
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "solid",
            message: Some("expected a solid or a table with a `polygons` list".into()),
        }),
    }
}

fn is_solid_table(table: &Table) -> LuaResult<bool> {
    Ok(matches!(table.get::<_, Value>("polygons")?, Value::Table(_)))
}

fn polygon_from_table(table: &Table) -> LuaResult<Polygon> {
    let vertices = match table.get::<_, Value>("vertices")? {
        Value::Table(list) => list
            .sequence_values::<Value>()
            .map(|item| item.map(|value| vertex_from_value(&value)))
            .collect::<LuaResult<Vec<_>>>()?,
        _ => Vec::new(),
    };
    Ok(Polygon::new(vertices, normal_from_table(table)?))
}

/// Lenient vertex read: whatever numbers are present are kept.
fn vertex_from_value(value: &Value) -> Vertex {
    let Value::Table(table) = value else {
        return Vertex::default();
    };
    let keyed: Vec<f64> = ["x", "y", "z"]
        .iter()
        .map_while(|key| table.get::<_, Option<f64>>(*key).ok().flatten())
        .collect();
    if !keyed.is_empty() {
        return Vertex(keyed);
    }
    Vertex(
        table
            .clone()
            .sequence_values::<Value>()
            .map_while(|item| match item {
                Ok(Value::Integer(n)) => Some(n as f64),
                Ok(Value::Number(n)) => Some(n),
                _ => None,
            })
            .collect(),
    )
}

/// Accepts `normal = {..}`, `plane_normal = {..}`, `plane = { normal = {..} }`
/// or `plane = {nx, ny, nz, w}`.
fn normal_from_table(table: &Table) -> LuaResult<Option<DVec3>> {
    for key in ["normal", "plane_normal"] {
        if let Value::Table(normal) = table.get::<_, Value>(key)? {
            return Ok(vertex_from_value(&Value::Table(normal)).position());
        }
    }
    let Value::Table(plane) = table.get::<_, Value>("plane")? else {
        return Ok(None);
    };
    match plane.get::<_, Value>("normal")? {
        Value::Table(normal) => Ok(vertex_from_value(&Value::Table(normal)).position()),
        _ => Ok(vertex_from_value(&Value::Table(plane)).position()),
    }
}
