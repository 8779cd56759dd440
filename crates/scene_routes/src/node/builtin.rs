//! Built-in node types.
//!
//! A representative subset of the standard content types, covering every mechanism the
//! runtime offers: grouping (`Group`, `Transform`), geometry with domain constraints
//! (`Sphere`, `Box`, `LineSet`, `IndexedFaceSet`), appearance, metadata, a time sensor,
//! interpolators, an event utility and the two loadable types (`ImageTexture`, `Inline`).
use glam::Vec3;
use tracing::{error, warn};

use crate::error::Result;
use crate::field::{FieldDeclaration, FieldType, FieldValue};
use crate::node::{Capability, ContentKind, NodeBehavior, NodeContext, NodeType};

/// Builds every built-in type. Types that fail to build are logged and left out.
pub fn standard_types() -> Vec<NodeType> {
    let built: Vec<Result<NodeType>> = vec![
        group(),
        transform(),
        shape(),
        appearance(),
        material(),
        sphere(),
        box_type(),
        line_set(),
        indexed_face_set(),
        coordinate(),
        world_info(),
        metadata_string(),
        time_sensor(),
        scalar_interpolator(),
        position_interpolator(),
        boolean_toggle(),
        image_texture(),
        inline(),
    ];

    built
        .into_iter()
        .filter_map(|ty| match ty {
            Ok(ty) => Some(ty),
            Err(e) => {
                error!("Built-in node type failed to build: {e}");
                None
            }
        })
        .collect()
}

const NO_BBOX: Vec3 = Vec3::splat(-1.0);

fn group() -> Result<NodeType> {
    NodeType::builder("Group")
        .capability(Capability::Metadata)
        .capability(Capability::Children)
        .field("bboxCenter", FieldType::SFVec3f, Vec3::ZERO)
        .field("bboxSize", FieldType::SFVec3f, NO_BBOX)
        .build()
}

fn transform() -> Result<NodeType> {
    NodeType::builder("Transform")
        .capability(Capability::Metadata)
        .capability(Capability::Children)
        .exposed_field("center", FieldType::SFVec3f, Vec3::ZERO)
        .exposed_field(
            "rotation",
            FieldType::SFRotation,
            FieldValue::rotation(Vec3::Z, 0.0),
        )
        .exposed_field("scale", FieldType::SFVec3f, Vec3::ONE)
        .exposed_field(
            "scaleOrientation",
            FieldType::SFRotation,
            FieldValue::rotation(Vec3::Z, 0.0),
        )
        .exposed_field("translation", FieldType::SFVec3f, Vec3::ZERO)
        .field("bboxCenter", FieldType::SFVec3f, Vec3::ZERO)
        .field("bboxSize", FieldType::SFVec3f, NO_BBOX)
        .behavior(TransformBehavior)
        .build()
}

fn shape() -> Result<NodeType> {
    NodeType::builder("Shape")
        .capability(Capability::Metadata)
        .exposed_field("appearance", FieldType::SFNode, FieldValue::Node(None))
        .exposed_field("geometry", FieldType::SFNode, FieldValue::Node(None))
        .build()
}

fn appearance() -> Result<NodeType> {
    NodeType::builder("Appearance")
        .capability(Capability::Metadata)
        .exposed_field("material", FieldType::SFNode, FieldValue::Node(None))
        .exposed_field("texture", FieldType::SFNode, FieldValue::Node(None))
        .build()
}

fn material() -> Result<NodeType> {
    NodeType::builder("Material")
        .capability(Capability::Metadata)
        .exposed_field("ambientIntensity", FieldType::SFFloat, 0.2f32)
        .exposed_field("diffuseColor", FieldType::SFColor, Vec3::splat(0.8))
        .exposed_field("emissiveColor", FieldType::SFColor, Vec3::ZERO)
        .exposed_field("shininess", FieldType::SFFloat, 0.2f32)
        .exposed_field("specularColor", FieldType::SFColor, Vec3::ZERO)
        .exposed_field("transparency", FieldType::SFFloat, 0.0f32)
        .behavior(MaterialBehavior)
        .build()
}

fn sphere() -> Result<NodeType> {
    NodeType::builder("Sphere")
        .capability(Capability::Metadata)
        .field("radius", FieldType::SFFloat, 1.0f32)
        .field("solid", FieldType::SFBool, true)
        .behavior(PrimitiveBehavior)
        .build()
}

fn box_type() -> Result<NodeType> {
    NodeType::builder("Box")
        .capability(Capability::Metadata)
        .field("size", FieldType::SFVec3f, Vec3::splat(2.0))
        .field("solid", FieldType::SFBool, true)
        .behavior(PrimitiveBehavior)
        .build()
}

fn line_set() -> Result<NodeType> {
    NodeType::builder("LineSet")
        .capability(Capability::Metadata)
        .exposed_field("color", FieldType::SFNode, FieldValue::Node(None))
        .exposed_field("coord", FieldType::SFNode, FieldValue::Node(None))
        .exposed_field("vertexCount", FieldType::MFInt32, Vec::<i32>::new())
        .behavior(IndexedGeometryBehavior)
        .build()
}

fn indexed_face_set() -> Result<NodeType> {
    NodeType::builder("IndexedFaceSet")
        .capability(Capability::Metadata)
        .exposed_field("color", FieldType::SFNode, FieldValue::Node(None))
        .exposed_field("coord", FieldType::SFNode, FieldValue::Node(None))
        .event_in("set_coordIndex", FieldType::MFInt32)
        .field("ccw", FieldType::SFBool, true)
        .field("coordIndex", FieldType::MFInt32, Vec::<i32>::new())
        .field("creaseAngle", FieldType::SFFloat, 0.0f32)
        .field("solid", FieldType::SFBool, true)
        .behavior(IndexedGeometryBehavior)
        .build()
}

fn coordinate() -> Result<NodeType> {
    NodeType::builder("Coordinate")
        .capability(Capability::Metadata)
        .exposed_field("point", FieldType::MFVec3f, Vec::<f32>::new())
        .build()
}

fn world_info() -> Result<NodeType> {
    NodeType::builder("WorldInfo")
        .capability(Capability::Metadata)
        .field("info", FieldType::MFString, FieldValue::strings(Vec::<String>::new()))
        .field("title", FieldType::SFString, "")
        .build()
}

fn metadata_string() -> Result<NodeType> {
    NodeType::builder("MetadataString")
        .capability(Capability::Metadata)
        .exposed_field("name", FieldType::SFString, "")
        .exposed_field("reference", FieldType::SFString, "")
        .exposed_field("value", FieldType::MFString, FieldValue::strings(Vec::<String>::new()))
        .build()
}

fn time_sensor() -> Result<NodeType> {
    NodeType::builder("TimeSensor")
        .capability(Capability::Metadata)
        .capability(Capability::Sensor)
        .exposed_field("cycleInterval", FieldType::SFTime, 1.0f64)
        .exposed_field("loop", FieldType::SFBool, false)
        .exposed_field("startTime", FieldType::SFTime, 0.0f64)
        .exposed_field("stopTime", FieldType::SFTime, 0.0f64)
        .event_out("cycleTime", FieldType::SFTime)
        .event_out("fraction_changed", FieldType::SFFloat)
        .event_out("time", FieldType::SFTime)
        .behavior(TimeSensorBehavior)
        .build()
}

fn scalar_interpolator() -> Result<NodeType> {
    NodeType::builder("ScalarInterpolator")
        .capability(Capability::Metadata)
        .event_in("set_fraction", FieldType::SFFloat)
        .exposed_field("key", FieldType::MFFloat, Vec::<f32>::new())
        .exposed_field("keyValue", FieldType::MFFloat, Vec::<f32>::new())
        .event_out("value_changed", FieldType::SFFloat)
        .behavior(InterpolatorBehavior)
        .build()
}

fn position_interpolator() -> Result<NodeType> {
    NodeType::builder("PositionInterpolator")
        .capability(Capability::Metadata)
        .event_in("set_fraction", FieldType::SFFloat)
        .exposed_field("key", FieldType::MFFloat, Vec::<f32>::new())
        .exposed_field("keyValue", FieldType::MFVec3f, Vec::<f32>::new())
        .event_out("value_changed", FieldType::SFVec3f)
        .behavior(InterpolatorBehavior)
        .build()
}

fn boolean_toggle() -> Result<NodeType> {
    NodeType::builder("BooleanToggle")
        .capability(Capability::Metadata)
        .event_in("set_boolean", FieldType::SFBool)
        .exposed_field("toggle", FieldType::SFBool, false)
        .behavior(BooleanToggleBehavior)
        .build()
}

fn image_texture() -> Result<NodeType> {
    NodeType::builder("ImageTexture")
        .capability(Capability::Metadata)
        .capability(Capability::Loadable)
        .field("repeatS", FieldType::SFBool, true)
        .field("repeatT", FieldType::SFBool, true)
        .build()
}

fn inline() -> Result<NodeType> {
    NodeType::builder("Inline")
        .capability(Capability::Metadata)
        .content_kind(ContentKind::Scene)
        .exposed_field("load", FieldType::SFBool, true)
        .field("bboxCenter", FieldType::SFVec3f, Vec3::ZERO)
        .field("bboxSize", FieldType::SFVec3f, NO_BBOX)
        .build()
}

fn in_unit_range(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

/// Writes a behavior output by name; a rejected write is logged and skipped.
fn publish(ctx: &mut NodeContext<'_>, name: &str, value: impl Into<FieldValue>) {
    if let Err(e) = ctx.set_named(name, value) {
        warn!(node = ?ctx.id(), field = name, "Behavior output rejected: {e}");
    }
}

fn publish_at(ctx: &mut NodeContext<'_>, index: usize, value: impl Into<FieldValue>) {
    if let Err(e) = ctx.set_output(index, value) {
        warn!(node = ?ctx.id(), index, "Behavior output rejected: {e}");
    }
}

struct TransformBehavior;

impl NodeBehavior for TransformBehavior {
    fn validate(
        &self,
        _index: usize,
        decl: &FieldDeclaration,
        value: &FieldValue,
    ) -> std::result::Result<(), String> {
        if decl.field_type == FieldType::SFRotation {
            let axis = value.as_vec4().map(|r| r.truncate()).unwrap_or(Vec3::ZERO);
            if axis.length_squared() == 0.0 {
                return Err("rotation axis must be non-zero".into());
            }
        }
        Ok(())
    }
}

struct MaterialBehavior;

impl NodeBehavior for MaterialBehavior {
    fn validate(
        &self,
        _index: usize,
        decl: &FieldDeclaration,
        value: &FieldValue,
    ) -> std::result::Result<(), String> {
        let ok = match value {
            FieldValue::Float(v) => in_unit_range(*v),
            FieldValue::FloatArray(a) => a.iter().copied().all(in_unit_range),
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{} must lie within [0, 1]", decl.name))
        }
    }
}

struct PrimitiveBehavior;

impl NodeBehavior for PrimitiveBehavior {
    fn validate(
        &self,
        _index: usize,
        decl: &FieldDeclaration,
        value: &FieldValue,
    ) -> std::result::Result<(), String> {
        match decl.name.as_str() {
            "radius" if value.as_f32().is_some_and(|r| !(r > 0.0)) => {
                Err("radius must be greater than 0".into())
            }
            "size"
                if value
                    .as_vec3()
                    .is_some_and(|s| s.to_array().iter().any(|c| !(*c > 0.0))) =>
            {
                Err("every size component must be greater than 0".into())
            }
            _ => Ok(()),
        }
    }
}

struct IndexedGeometryBehavior;

impl NodeBehavior for IndexedGeometryBehavior {
    fn validate(
        &self,
        _index: usize,
        decl: &FieldDeclaration,
        value: &FieldValue,
    ) -> std::result::Result<(), String> {
        match decl.name.as_str() {
            "vertexCount" => {
                let counts = value.as_i32_slice().unwrap_or(&[]);
                match counts.iter().position(|&c| c < 2) {
                    Some(i) => Err(format!("entry {i} is {}, must be >= 2", counts[i])),
                    None => Ok(()),
                }
            }
            "coordIndex" | "set_coordIndex" => {
                let indices = value.as_i32_slice().unwrap_or(&[]);
                match indices.iter().position(|&c| c < -1) {
                    Some(i) => Err(format!("entry {i} is {}, must be >= -1", indices[i])),
                    None => Ok(()),
                }
            }
            "creaseAngle" if value.as_f32().is_some_and(|a| !(a >= 0.0)) => {
                Err("creaseAngle must not be negative".into())
            }
            _ => Ok(()),
        }
    }

    fn field_changed(&self, ctx: &mut NodeContext<'_>, index: usize) {
        // set_coordIndex replaces the initialize-only index list.
        if Some(index) == ctx.index_of("set_coordIndex") {
            if let (Some(value), Some(target)) = (ctx.get(index).cloned(), ctx.index_of("coordIndex")) {
                publish_at(ctx, target, value);
            }
        }
    }
}

struct TimeSensorBehavior;

impl TimeSensorBehavior {
    fn f64_field(ctx: &NodeContext<'_>, name: &str) -> f64 {
        ctx.get_named(name).and_then(FieldValue::as_f64).unwrap_or(0.0)
    }

    fn bool_field(ctx: &NodeContext<'_>, name: &str) -> bool {
        ctx.get_named(name).and_then(FieldValue::as_bool).unwrap_or(false)
    }
}

impl NodeBehavior for TimeSensorBehavior {
    fn validate(
        &self,
        _index: usize,
        decl: &FieldDeclaration,
        value: &FieldValue,
    ) -> std::result::Result<(), String> {
        if decl.name == "cycleInterval" && value.as_f64().is_some_and(|c| !(c > 0.0)) {
            return Err("cycleInterval must be greater than 0".into());
        }
        Ok(())
    }

    fn field_changed(&self, ctx: &mut NodeContext<'_>, index: usize) {
        let disabled = Some(index) == ctx.index_of("enabled") && !Self::bool_field(ctx, "enabled");
        if disabled && Self::bool_field(ctx, "isActive") {
            publish(ctx, "isActive", false);
        }
    }

    fn tick(&self, ctx: &mut NodeContext<'_>) {
        let now = ctx.time();
        let start = Self::f64_field(ctx, "startTime");
        let stop = Self::f64_field(ctx, "stopTime");
        let interval = Self::f64_field(ctx, "cycleInterval");
        let looping = Self::bool_field(ctx, "loop");
        let was_active = Self::bool_field(ctx, "isActive");
        if interval <= 0.0 {
            return;
        }

        let elapsed = now - start;
        let before_stop = stop <= start || now < stop;
        let active = now >= start && before_stop && (looping || elapsed < interval);

        if active {
            if !was_active {
                publish(ctx, "isActive", true);
            }
            let cycle_start = start + (elapsed / interval).floor() * interval;
            if !was_active || cycle_start > Self::f64_field(ctx, "cycleTime") {
                publish(ctx, "cycleTime", cycle_start);
            }
            let fraction = (elapsed % interval) / interval;
            publish(ctx, "fraction_changed", fraction as f32);
            publish(ctx, "time", now);
        } else if was_active {
            if !looping && before_stop && elapsed >= interval {
                publish(ctx, "fraction_changed", 1.0f32);
            }
            publish(ctx, "time", now);
            publish(ctx, "isActive", false);
        }
    }
}

/// Piecewise-linear interpolation of `width`-component key values.
fn interpolate(keys: &[f32], values: &[f32], width: usize, t: f32) -> Option<Vec<f32>> {
    let n = keys.len().min(values.len() / width.max(1));
    if n == 0 {
        return None;
    }
    let at = |i: usize| &values[i * width..(i + 1) * width];
    if t <= keys[0] {
        return Some(at(0).to_vec());
    }
    if t >= keys[n - 1] {
        return Some(at(n - 1).to_vec());
    }
    let i = keys[..n].windows(2).position(|w| t >= w[0] && t < w[1])?;
    let span = keys[i + 1] - keys[i];
    let s = if span > 0.0 { (t - keys[i]) / span } else { 0.0 };
    Some(
        at(i)
            .iter()
            .zip(at(i + 1))
            .map(|(a, b)| a + (b - a) * s)
            .collect(),
    )
}

struct InterpolatorBehavior;

impl NodeBehavior for InterpolatorBehavior {
    fn validate(
        &self,
        _index: usize,
        decl: &FieldDeclaration,
        value: &FieldValue,
    ) -> std::result::Result<(), String> {
        if decl.name == "key" {
            let keys = value.as_f32_slice().unwrap_or(&[]);
            if keys.windows(2).any(|w| w[1] < w[0]) {
                return Err("keys must be non-decreasing".into());
            }
        }
        Ok(())
    }

    fn field_changed(&self, ctx: &mut NodeContext<'_>, index: usize) {
        if Some(index) != ctx.index_of("set_fraction") {
            return;
        }
        let Some(out) = ctx.index_of("value_changed") else {
            return;
        };
        let t = ctx.get(index).and_then(FieldValue::as_f32).unwrap_or(0.0);
        let keys = ctx.get_named("key").and_then(FieldValue::as_f32_slice).unwrap_or(&[]);
        let values = ctx
            .get_named("keyValue")
            .and_then(FieldValue::as_f32_slice)
            .unwrap_or(&[]);
        let scalar = matches!(ctx.get(out), Some(FieldValue::Float(_)));
        let width = if scalar { 1 } else { 3 };

        if let Some(v) = interpolate(keys, values, width, t) {
            let value = if scalar {
                FieldValue::Float(v[0])
            } else {
                FieldValue::floats(v)
            };
            publish_at(ctx, out, value);
        }
    }
}

struct BooleanToggleBehavior;

impl NodeBehavior for BooleanToggleBehavior {
    fn field_changed(&self, ctx: &mut NodeContext<'_>, index: usize) {
        if Some(index) != ctx.index_of("set_boolean") {
            return;
        }
        if ctx.get(index).and_then(FieldValue::as_bool) == Some(true) {
            let current = ctx.get_named("toggle").and_then(FieldValue::as_bool).unwrap_or(false);
            publish(ctx, "toggle", !current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::AccessMode;

    fn build_all() -> Vec<NodeType> {
        standard_types()
    }

    #[test]
    fn every_builtin_type_builds() {
        assert_eq!(build_all().len(), 18);
    }

    #[test]
    fn transform_exposes_standard_fields() {
        let ty = transform().expect("Transform builds");
        let table = ty.table();
        let t = table.index_of("translation").expect("translation");
        assert_eq!(table.index_of("set_translation"), Some(t));
        assert_eq!(table.index_of("translation_changed"), Some(t));
        assert_eq!(
            table.declaration(t).map(|d| d.access),
            Some(AccessMode::ExposedField)
        );
        assert!(ty.has_capability(Capability::Children));
    }

    #[test]
    fn line_set_rejects_short_polylines() {
        let ty = line_set().expect("LineSet builds");
        let idx = ty.table().index_of("vertexCount").expect("vertexCount");
        let decl = ty.table().declaration(idx).expect("declared");
        ty.behavior()
            .validate(idx, decl, &FieldValue::ints(vec![2, 3]))
            .expect("counts >= 2 are fine");
        let reason = ty
            .behavior()
            .validate(idx, decl, &FieldValue::ints(vec![2, 1]))
            .expect_err("count 1 rejected");
        assert!(reason.contains("entry 1"));
    }

    #[test]
    fn primitive_sizes_must_be_positive() {
        let ty = sphere().expect("Sphere builds");
        let idx = ty.table().index_of("radius").expect("radius");
        let decl = ty.table().declaration(idx).expect("declared");
        assert!(ty.behavior().validate(idx, decl, &FieldValue::Float(0.0)).is_err());
        assert!(ty.behavior().validate(idx, decl, &FieldValue::Float(0.5)).is_ok());
    }

    #[test]
    fn nan_sizes_and_angles_are_rejected() {
        let ty = sphere().expect("Sphere builds");
        let idx = ty.table().index_of("radius").expect("radius");
        let decl = ty.table().declaration(idx).expect("declared");
        assert!(ty.behavior().validate(idx, decl, &FieldValue::Float(f32::NAN)).is_err());

        let ty = box_type().expect("Box builds");
        let idx = ty.table().index_of("size").expect("size");
        let decl = ty.table().declaration(idx).expect("declared");
        assert!(ty
            .behavior()
            .validate(idx, decl, &Vec3::new(1.0, f32::NAN, 1.0).into())
            .is_err());

        let ty = indexed_face_set().expect("IndexedFaceSet builds");
        let idx = ty.table().index_of("creaseAngle").expect("creaseAngle");
        let decl = ty.table().declaration(idx).expect("declared");
        assert!(ty.behavior().validate(idx, decl, &FieldValue::Float(f32::NAN)).is_err());
        assert!(ty.behavior().validate(idx, decl, &FieldValue::Float(0.0)).is_ok());

        let ty = time_sensor().expect("TimeSensor builds");
        let idx = ty.table().index_of("cycleInterval").expect("cycleInterval");
        let decl = ty.table().declaration(idx).expect("declared");
        assert!(ty.behavior().validate(idx, decl, &FieldValue::Double(f64::NAN)).is_err());
    }

    #[test]
    fn material_colors_are_clamped_to_unit_range() {
        let ty = material().expect("Material builds");
        let idx = ty.table().index_of("diffuseColor").expect("diffuseColor");
        let decl = ty.table().declaration(idx).expect("declared");
        assert!(ty
            .behavior()
            .validate(idx, decl, &Vec3::new(1.0, 0.5, 1.5).into())
            .is_err());
    }

    #[test]
    fn interpolate_is_piecewise_linear() {
        let keys = [0.0, 0.5, 1.0];
        let values = [0.0, 10.0, 20.0];
        assert_eq!(interpolate(&keys, &values, 1, -1.0), Some(vec![0.0]));
        assert_eq!(interpolate(&keys, &values, 1, 0.25), Some(vec![5.0]));
        assert_eq!(interpolate(&keys, &values, 1, 0.75), Some(vec![15.0]));
        assert_eq!(interpolate(&keys, &values, 1, 2.0), Some(vec![20.0]));
        assert_eq!(interpolate(&[], &values, 1, 0.5), None);
    }

    #[test]
    fn interpolate_handles_vector_values() {
        let keys = [0.0, 1.0];
        let values = [0.0, 0.0, 0.0, 2.0, 4.0, 6.0];
        assert_eq!(
            interpolate(&keys, &values, 3, 0.5),
            Some(vec![1.0, 2.0, 3.0])
        );
    }
}
