//! COLLADA 1.4 schema definitions.
//!
//! Only a working subset of the format is modeled. Elements without a
//! schema are skipped along with everything below them.
//!
//! ## Supported
//!
//! - `asset` metadata
//! - Libraries: images, effects (`profile_COMMON` only), materials,
//!   geometries (`mesh` sources, vertices, triangles/polylist/lines),
//!   visual scenes and nodes, cameras, lights, controllers (`skin`),
//!   animations and animation clips
//! - The `scene` element
//!
//! ## Not Yet Supported
//!
//! - `profile_GLSL`, `profile_CG` and other FX profiles
//! - Physics, kinematics, `polygons` with holes, `morph` controllers

use std::sync::OnceLock;

use crate::children;
use crate::dialect::Dialect;
use crate::error::{ParseError, ParseResult};
use crate::schema::{
    attributes, attributes_with, hierarchy, hoist, library, multiple, rename, text_value, Binding,
    SchemaNode, SchemaRegistry,
};
use crate::value::{Attributes, Value};

/// Root element name.
pub const ROOT_TAG: &str = "COLLADA";

/// COLLADA document dialect: `<COLLADA version="1.4.x">`.
pub fn dialect() -> Dialect {
    Dialect::new(ROOT_TAG, ROOT_TAG).with_versions("version", &[(1, 4)])
}

/// Process-wide COLLADA registry, built on first use.
pub fn shared() -> &'static SchemaRegistry {
    static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
    REGISTRY.get_or_init(registry)
}

/// Build a fresh COLLADA schema registry.
pub fn registry() -> SchemaRegistry {
    let mut r = SchemaRegistry::new();

    // Scalars and buffers
    r.define("attributes", attributes())
        .define("boolean", text_value(parse_bool))
        .define("string", text_value(|s| Ok(Value::from(s))))
        .define("date", "string")
        .define("stringArray", text_value(parse_strings))
        .define("float", text_value(parse_float))
        .define("floatArray", text_value(parse_floats))
        .define("intArray", text_value(parse_ints))
        .define("fxSamplerWrapCommon", "string")
        .define("fxSamplerFilterCommon", "string");

    r.define(
        ROOT_TAG,
        hierarchy(children! {
            "asset" => "asset",
            "library_animations" => rename("animations", library("animation", "animation")),
            "library_animation_clips" => rename(
                "animationClips",
                library("animation_clip", "animationClip"),
            ),
            "library_cameras" => rename("cameras", library("camera", "camera")),
            "library_controllers" => rename("controllers", library("controller", "controller")),
            "library_geometries" => rename("geometries", library("geometry", "geometry")),
            "library_lights" => rename("lights", library("light", "light")),
            "library_nodes" => rename("nodes", library("node", "node")),
            "library_visual_scenes" => rename(
                "visualScenes",
                library("visual_scene", "visualScene"),
            ),
            "library_images" => rename("images", library("image", "image")),
            "library_effects" => rename("effects", library("effect", "effect")),
            "library_materials" => rename("materials", library("material", "material")),
            "scene" => "scene",
        }),
    );

    r.define(
        "asset",
        hierarchy(children! {
            "contributor" => multiple("contributor"),
            "created" => "date",
            "modified" => "date",
            "keywords" => "stringArray",
            "revision" => "string",
            "subject" => "string",
            "title" => "string",
            "unit" => "attributes",
            "up_axis" => rename("upAxis", "string"),
        }),
    )
    .define(
        "contributor",
        hierarchy(children! {
            "author" => "string",
            "authoring_tool" => "string",
            "comments" => "string",
            "copyright" => "string",
            "source_data" => rename("sourceData", "string"),
        }),
    )
    .define(
        "scene",
        hierarchy(children! {
            "instance_visual_scene" => rename("visualScene", attribute("url")),
        }),
    );

    define_fx(&mut r);
    define_geometry(&mut r);
    define_scene_graph(&mut r);
    define_animation(&mut r);
    r
}

fn define_fx(r: &mut SchemaRegistry) {
    r.define(
        "image",
        hierarchy(children! { "init_from" => rename("initFrom", "string") }).bind(Binding::Global),
    )
    .define(
        "material",
        hierarchy(children! { "instance_effect" => rename("effect", attribute("url")) })
            .bind(Binding::Global),
    )
    .define(
        "effect",
        hierarchy(children! {
            "asset" => "asset",
            "image" => rename("images", multiple("image")),
            // Only the COMMON profile is modeled
            "profile_COMMON" => rename("common", hierarchy(children! {
                "asset" => "asset",
                "image" => rename("images", multiple("image")),
                "newparam" => rename("params", multiple("newparam")),
                "technique" => hoist(children! {
                    "blinn" => shading("blinn"),
                    "constant" => shading("constant"),
                    "lambert" => shading("lambert"),
                    "phong" => shading("phong"),
                })
                .bind(Binding::Scoped),
            })
            .bind(Binding::Scope)),
        })
        .bind(Binding::Scope)
        .on_close(flatten_common),
    )
    .define(
        "newparam",
        hoist(children! {
            "float" => "float",
            "float2" => "floatArray",
            "float3" => "floatArray",
            "float4" => "floatArray",
            "surface" => "surface",
            "sampler2D" => "sampler",
        })
        .bind(Binding::Scoped),
    )
    .define(
        "colorOrTexture",
        hoist(children! {
            "color" => "floatArray",
            "param" => attribute("ref"),
            // texcoord binding is not modeled
            "texture" => attribute("texture"),
        }),
    )
    .define(
        "floatOrParam",
        hoist(children! {
            "float" => "float",
            "param" => attribute("ref"),
        }),
    )
    .define(
        "surface",
        hierarchy(children! {
            "size" => "floatArray",
            "mipmap_generate" => rename("mipmapGenerate", "boolean"),
            "channels" => "string",
            "range" => "string",
            "init_cube" => "noop",
            "init_from" => rename("initFrom", "string"),
        })
        .bind(Binding::Attributes),
    )
    .define(
        "sampler",
        hierarchy(children! {
            "source" => "string",
            "wrap_s" => rename("wrapS", "fxSamplerWrapCommon"),
            "wrap_t" => rename("wrapT", "fxSamplerWrapCommon"),
            "minfilter" => "fxSamplerFilterCommon",
            "magfilter" => "fxSamplerFilterCommon",
            "mipfilter" => "fxSamplerFilterCommon",
        }),
    );
}

fn define_geometry(r: &mut SchemaRegistry) {
    r.define(
        "geometry",
        hierarchy(children! { "mesh" => "mesh" }).bind(Binding::Global),
    )
    .define(
        "mesh",
        hierarchy(children! {
            "source" => rename("sources", multiple("source")),
            "vertices" => "vertices",
            "triangles" => rename("primitives", multiple(primitive("triangles"))),
            "polylist" => rename("primitives", multiple(primitive("polylist"))),
            "lines" => rename("primitives", multiple(primitive("lines"))),
        }),
    )
    .define(
        "source",
        hierarchy(children! {
            "float_array" => rename("data", "floatArray"),
            "int_array" => rename("data", "intArray"),
            "Name_array" => rename("data", "stringArray"),
            "IDREF_array" => rename("data", "stringArray"),
            "technique_common" => rename("accessor", hoist(children! { "accessor" => "accessor" })),
        })
        .bind(Binding::Global),
    )
    .define(
        "accessor",
        hierarchy(children! { "param" => rename("params", multiple("attributes")) })
            .bind(Binding::Attributes),
    )
    .define("vertices", inputs().bind(Binding::Global))
    .define(
        "controller",
        hierarchy(children! { "skin" => "skin" }).bind(Binding::Global),
    )
    .define(
        "skin",
        hierarchy(children! {
            "bind_shape_matrix" => rename("bindShapeMatrix", "floatArray"),
            "source" => rename("sources", multiple("source")),
            "joints" => inputs(),
            "vertex_weights" => rename("vertexWeights", hierarchy(children! {
                "input" => rename("inputs", multiple("attributes")),
                "vcount" => rename("vertexCounts", "intArray"),
                "v" => rename("indices", "intArray"),
            })
            .bind(Binding::Attributes)),
        })
        .bind(Binding::Attributes),
    );
}

fn define_scene_graph(r: &mut SchemaRegistry) {
    r.define(
        "visualScene",
        hierarchy(children! { "node" => rename("nodes", multiple("node")) }).bind(Binding::Scope),
    )
    .define(
        "node",
        hierarchy(children! {
            "node" => rename("children", multiple("node")),
            "matrix" => "floatArray",
            "translate" => multiple("floatArray"),
            "rotate" => multiple("floatArray"),
            "scale" => "floatArray",
            "instance_geometry" => rename("geometries", multiple("instanceGeometry")),
            "instance_controller" => rename("controllers", multiple("instanceGeometry")),
            "instance_camera" => rename("cameras", multiple(attribute("url"))),
            "instance_light" => rename("lights", multiple(attribute("url"))),
            "instance_node" => rename("instances", multiple(attribute("url"))),
        })
        .bind(Binding::Scope),
    )
    .define(
        "instanceGeometry",
        hierarchy(children! {
            "bind_material" => rename("materials", hoist(children! {
                "technique_common" => library("instance_material", "instanceMaterial"),
            })),
        })
        .bind(Binding::Attributes),
    )
    .define(
        "instanceMaterial",
        hierarchy(children! {
            "bind_vertex_input" => rename("vertexInputs", multiple("attributes")),
        })
        .bind(Binding::Attributes),
    )
    .define(
        "camera",
        hierarchy(children! {
            "optics" => hoist(children! {
                "technique_common" => hoist(children! {
                    "perspective" => projection("perspective", "xfov", "yfov"),
                    "orthographic" => projection("orthographic", "xmag", "ymag"),
                }),
            }),
        })
        .bind(Binding::Global),
    )
    .define(
        "light",
        hierarchy(children! {
            "technique_common" => rename("technique", hoist(children! {
                "ambient" => emitter("ambient"),
                "directional" => emitter("directional"),
                "point" => emitter("point"),
                "spot" => emitter("spot"),
            })),
        })
        .bind(Binding::Global),
    );
}

fn define_animation(r: &mut SchemaRegistry) {
    r.define(
        "animation",
        hierarchy(children! {
            "animation" => rename("children", multiple("animation")),
            "source" => rename("sources", multiple("source")),
            "sampler" => rename("samplers", multiple("animationSampler")),
            "channel" => rename("channels", multiple("attributes")),
        })
        .bind(Binding::Scope),
    )
    .define("animationSampler", inputs().bind(Binding::Global))
    .define(
        "animationClip",
        hierarchy(children! {
            "instance_animation" => rename("animations", multiple(attribute("url"))),
        })
        .bind(Binding::Global),
    );
}

/// Material parameters shared by every COMMON shading model.
fn shading(model: &'static str) -> SchemaNode {
    hierarchy(children! {
        "emission" => "colorOrTexture",
        "ambient" => "colorOrTexture",
        "diffuse" => "colorOrTexture",
        "specular" => "colorOrTexture",
        "shininess" => "floatOrParam",
        "reflective" => "colorOrTexture",
        "reflectivity" => "floatOrParam",
        "transparent" => "colorOrTexture",
        "transparency" => "floatOrParam",
        "index_of_refraction" => rename("refraction", "floatOrParam"),
    })
    .on_enter(tag_type(model))
}

fn primitive(kind: &'static str) -> SchemaNode {
    hierarchy(children! {
        "input" => rename("inputs", multiple("attributes")),
        "p" => rename("indices", "intArray"),
        "vcount" => rename("vertexCounts", "intArray"),
    })
    .bind(Binding::Attributes)
    .on_enter(tag_type(kind))
}

fn projection(kind: &'static str, x: &str, y: &str) -> SchemaNode {
    hierarchy(children! {
        x => "float",
        y => "float",
        "aspect_ratio" => rename("aspectRatio", "float"),
        "znear" => "float",
        "zfar" => "float",
    })
    .on_enter(tag_type(kind))
}

fn emitter(kind: &'static str) -> SchemaNode {
    hierarchy(children! {
        "color" => "floatArray",
        "constant_attenuation" => rename("constantAttenuation", "float"),
        "linear_attenuation" => rename("linearAttenuation", "float"),
        "quadratic_attenuation" => rename("quadraticAttenuation", "float"),
        "falloff_angle" => rename("falloffAngle", "float"),
        "falloff_exponent" => rename("falloffExponent", "float"),
    })
    .on_enter(tag_type(kind))
}

fn inputs() -> SchemaNode {
    hierarchy(children! { "input" => rename("inputs", multiple("attributes")) })
}

/// A single attribute's value, or nothing when absent.
fn attribute(name: &'static str) -> SchemaNode {
    attributes_with(move |attrs: &Attributes| {
        Ok(attrs.get(name).map(|v| Value::from(v.as_str())).unwrap_or_default())
    })
}

fn tag_type(
    kind: &'static str,
) -> impl Fn(&Attributes, &mut Value) -> ParseResult<()> + Send + Sync {
    move |_, data| {
        data.insert("type", Value::from(kind));
        Ok(())
    }
}

/// Lift the COMMON profile into the effect itself, keeping images from both.
fn flatten_common(mut effect: Value) -> ParseResult<Value> {
    let Some(map) = effect.as_map_mut() else {
        return Ok(effect);
    };
    let Some(Value::Map(mut common)) = map.remove("common") else {
        return Ok(effect);
    };

    let mut images = match map.remove("images") {
        Some(Value::List(images)) => images,
        _ => Vec::new(),
    };
    if let Some(Value::List(more)) = common.remove("images") {
        images.extend(more);
    }
    map.extend(common);
    map.insert("images".to_string(), Value::List(images));
    Ok(effect)
}

fn parse_bool(text: &str) -> ParseResult<Value> {
    match text {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        other => Err(ParseError::InvalidBoolean(other.to_string())),
    }
}

fn parse_float(text: &str) -> ParseResult<Value> {
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

fn parse_floats(text: &str) -> ParseResult<Value> {
    text.split_whitespace()
        .map(|s| s.parse::<f32>().map_err(|_| ParseError::InvalidNumber(s.to_string())))
        .collect::<ParseResult<Vec<_>>>()
        .map(Value::Floats)
}

fn parse_ints(text: &str) -> ParseResult<Value> {
    text.split_whitespace()
        .map(|s| s.parse::<i64>().map_err(|_| ParseError::InvalidNumber(s.to_string())))
        .collect::<ParseResult<Vec<_>>>()
        .map(Value::Ints)
}

fn parse_strings(text: &str) -> ParseResult<Value> {
    Ok(Value::Strings(text.split_whitespace().map(str::to_string).collect()))
}
