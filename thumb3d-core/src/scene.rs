//! Base scene asset and per-job scene composition.
//!
//! A base scene is a JSON document with three sections: `project` (renderer
//! flags), `camera` (lens and initial placement) and `scene` (the object
//! graph). The `scene.meshSlot` field names the mesh object that receives the
//! thumbnailed geometry. Every call to [`BaseScene::instantiate`] parses the
//! source again so each job owns an independent [`Scene`] and [`Camera`].
use std::path::Path;
use std::sync::Arc;

use nalgebra::{Matrix4, Point3, Vector3};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::color::{Color, MAX_RGB};
use crate::error::SceneError;
use crate::geometry::{Geometry, Mesh};
use crate::projection::Camera;
use crate::transform::{RotationState, Transform};

const DEFAULT_SCENE: &str = include_str!("../scenes/default.json");

/// Renderer flags carried by the `project` section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectSettings {
    pub gamma_input: bool,
    pub gamma_output: bool,
    pub shadows: bool,
}

/// Which triangle faces a material draws
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Lighting model of a material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shading {
    /// Unlit flat color
    Basic,
    /// Diffuse only
    Lambert,
    /// Diffuse plus Blinn-Phong highlights
    #[default]
    Phong,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub shading: Shading,
    pub color: Color,
    pub emissive: Color,
    pub specular: Color,
    pub shininess: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub side: Side,
}

impl Material {
    /// Whether the material is blended over what is behind it
    pub fn is_translucent(&self) -> bool {
        self.transparent && self.opacity < 1.0
    }

    /// Alpha the material writes
    pub fn alpha(&self) -> f32 {
        if self.transparent {
            self.opacity
        } else {
            1.0
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shading: Shading::Phong,
            color: Color::WHITE,
            emissive: Color::BLACK,
            specular: Color::from_hex(0x111111),
            shininess: 30.0,
            opacity: 1.0,
            transparent: false,
            side: Side::Front,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Ambient {
        color: Color,
        intensity: f32,
    },
    /// Shines from the node position toward the origin
    Directional {
        color: Color,
        intensity: f32,
        cast_shadow: bool,
    },
    /// Radiates from the node position; `distance == 0` disables falloff
    Point {
        color: Color,
        intensity: f32,
        distance: f32,
        decay: f32,
    },
}

#[derive(Debug, Clone)]
pub struct MeshObject {
    pub geometry: Option<Arc<Geometry>>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(MeshObject),
    Light(Light),
}

/// A scene graph node
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(name))
    }

    fn collect<'a>(&'a self, parent: &Matrix4<f32>, out: &mut Vec<(Matrix4<f32>, &'a Node)>) {
        let world = parent * self.transform.matrix();
        out.push((world, self));
        for child in &self.children {
            child.collect(&world, out);
        }
    }
}

/// Object graph rendered by one job
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub background: Option<Color>,
    pub mesh_slot: Option<String>,
    pub nodes: Vec<Node>,
}

impl Scene {
    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find_map(|node| node.find_mut(name))
    }

    /// The mesh object named by `mesh_slot`, if the slot is declared and
    /// names a mesh.
    pub fn mesh_slot_mut(&mut self) -> Option<&mut MeshObject> {
        let slot = self.mesh_slot.clone()?;
        match self.find_by_name_mut(&slot) {
            Some(Node {
                kind: NodeKind::Mesh(mesh),
                ..
            }) => Some(mesh),
            _ => None,
        }
    }

    /// Every node paired with its world matrix, parents before children
    pub fn world_nodes(&self) -> Vec<(Matrix4<f32>, &Node)> {
        let mut out = Vec::new();
        for node in &self.nodes {
            node.collect(&Matrix4::identity(), &mut out);
        }
        out
    }

    /// Override the slot material's color and opacity. Opacity below one
    /// turns blending on. Returns `false` when there is no slot.
    pub fn apply_base_material(&mut self, color: Color, opacity: f32) -> bool {
        match self.mesh_slot_mut() {
            Some(mesh) => {
                mesh.material.color = color;
                mesh.material.opacity = opacity;
                mesh.material.transparent = opacity < 1.0;
                true
            }
            None => false,
        }
    }
}

/// Fresh scene, camera and renderer flags for one job
#[derive(Debug, Clone)]
pub struct ComposedScene {
    pub project: ProjectSettings,
    pub scene: Scene,
    pub camera: Camera,
}

/// Immutable base scene source shared by every job
#[derive(Debug, Clone)]
pub struct BaseScene {
    source: Arc<str>,
}

impl BaseScene {
    /// The scene bundled with the crate
    pub fn builtin() -> Self {
        Self {
            source: Arc::from(DEFAULT_SCENE),
        }
    }

    /// Validate and wrap a JSON scene description
    pub fn from_json(json: impl Into<String>) -> Result<Self, SceneError> {
        let scene = Self {
            source: Arc::from(json.into()),
        };
        scene.instantiate()?;
        Ok(scene)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SceneError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(json)
    }

    /// Deserialize an independent scene and camera from the source
    pub fn instantiate(&self) -> Result<ComposedScene, SceneError> {
        let file: SceneFile = serde_json::from_str(&self.source)?;
        file.build()
    }
}

impl Default for BaseScene {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Instantiate `base` and inject `geometry` into its mesh slot.
///
/// A missing or non-mesh slot is not an error: a warning is logged and the
/// scene is returned without the geometry.
pub fn compose(base: &BaseScene, geometry: Arc<Geometry>) -> Result<ComposedScene, SceneError> {
    let mut composed = base.instantiate()?;
    let slot = composed.scene.mesh_slot.clone();

    match composed.scene.mesh_slot_mut() {
        Some(mesh) => {
            debug!(slot = ?slot, triangles = geometry.triangle_count(), "injected geometry into mesh slot");
            mesh.geometry = Some(geometry);
        }
        None => match slot {
            Some(name) => warn!(slot = %name, "no mesh object named by the scene's mesh slot, rendering without the part"),
            None => warn!("scene declares no mesh slot, rendering without the part"),
        },
    }

    Ok(composed)
}

// On-disk description

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneFile {
    #[serde(default)]
    project: ProjectDescription,
    #[serde(default)]
    camera: CameraDescription,
    scene: SceneDescription,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDescription {
    #[serde(default)]
    gamma_input: bool,
    #[serde(default)]
    gamma_output: bool,
    #[serde(default)]
    shadows: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CameraDescription {
    fov: f32,
    near: f32,
    far: f32,
    up: [f32; 3],
    position: [f32; 3],
}

impl Default for CameraDescription {
    fn default() -> Self {
        Self {
            fov: 50.0,
            near: 0.1,
            far: 2000.0,
            up: [0.0, 1.0, 0.0],
            position: [0.0, 0.0, 5.0],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneDescription {
    #[serde(default)]
    mesh_slot: Option<String>,
    #[serde(default)]
    background: Option<u32>,
    #[serde(default)]
    objects: Vec<ObjectDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectDescription {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    position: Option<[f32; 3]>,
    #[serde(default)]
    rotation: Option<[f32; 3]>,
    #[serde(default)]
    scale: Option<[f32; 3]>,
    #[serde(default)]
    children: Vec<ObjectDescription>,
    #[serde(flatten)]
    kind: KindDescription,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum KindDescription {
    Group,
    Mesh(MeshDescription),
    AmbientLight(LightDescription),
    DirectionalLight(LightDescription),
    PointLight(LightDescription),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeshDescription {
    #[serde(default)]
    geometry: Option<GeometryDescription>,
    #[serde(default)]
    material: MaterialDescription,
    #[serde(default)]
    cast_shadow: bool,
    #[serde(default)]
    receive_shadow: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum GeometryDescription {
    Cube {
        #[serde(default = "unit")]
        size: f32,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MaterialDescription {
    #[serde(rename = "type")]
    shading: Shading,
    color: u32,
    emissive: u32,
    specular: u32,
    shininess: f32,
    opacity: f32,
    transparent: bool,
    side: Side,
}

impl Default for MaterialDescription {
    fn default() -> Self {
        Self {
            shading: Shading::Phong,
            color: 0xffffff,
            emissive: 0x000000,
            specular: 0x111111,
            shininess: 30.0,
            opacity: 1.0,
            transparent: false,
            side: Side::Front,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LightDescription {
    color: u32,
    intensity: f32,
    cast_shadow: bool,
    distance: f32,
    decay: f32,
}

impl Default for LightDescription {
    fn default() -> Self {
        Self {
            color: 0xffffff,
            intensity: 1.0,
            cast_shadow: false,
            distance: 0.0,
            decay: 1.0,
        }
    }
}

fn unit() -> f32 {
    1.0
}

fn color(hex: u32, what: &str) -> Result<Color, SceneError> {
    if hex > MAX_RGB {
        return Err(SceneError::Invalid(format!(
            "{what} color {hex:#x} exceeds 0xffffff"
        )));
    }
    Ok(Color::from_hex(hex))
}

impl SceneFile {
    fn build(self) -> Result<ComposedScene, SceneError> {
        let camera = self.camera.build()?;
        let scene = Scene {
            background: self.scene.background.map(|c| color(c, "background")).transpose()?,
            mesh_slot: self.scene.mesh_slot,
            nodes: self
                .scene
                .objects
                .into_iter()
                .map(ObjectDescription::build)
                .collect::<Result<_, _>>()?,
        };

        Ok(ComposedScene {
            project: ProjectSettings {
                gamma_input: self.project.gamma_input,
                gamma_output: self.project.gamma_output,
                shadows: self.project.shadows,
            },
            scene,
            camera,
        })
    }
}

impl CameraDescription {
    fn build(self) -> Result<Camera, SceneError> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(SceneError::Invalid(format!(
                "camera fov must be within (0, 180) degrees, got {}",
                self.fov
            )));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(SceneError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got near {} far {}",
                self.near, self.far
            )));
        }

        let mut camera = Camera::perspective(self.fov, 1.0, self.near, self.far);
        camera.up = Vector3::from(self.up);
        camera.position = Point3::from(self.position);
        Ok(camera)
    }
}

impl ObjectDescription {
    fn build(self) -> Result<Node, SceneError> {
        let transform = Transform {
            position: self.position.map(Vector3::from).unwrap_or_else(Vector3::zeros),
            rotation: self
                .rotation
                .map(|[x, y, z]| RotationState::new(x, y, z))
                .unwrap_or_default(),
            scale: self
                .scale
                .map(Vector3::from)
                .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0)),
        };

        let kind = match self.kind {
            KindDescription::Group => NodeKind::Group,
            KindDescription::Mesh(mesh) => NodeKind::Mesh(mesh.build()?),
            KindDescription::AmbientLight(light) => NodeKind::Light(Light::Ambient {
                color: color(light.color, "light")?,
                intensity: light.intensity,
            }),
            KindDescription::DirectionalLight(light) => NodeKind::Light(Light::Directional {
                color: color(light.color, "light")?,
                intensity: light.intensity,
                cast_shadow: light.cast_shadow,
            }),
            KindDescription::PointLight(light) => NodeKind::Light(Light::Point {
                color: color(light.color, "light")?,
                intensity: light.intensity,
                distance: light.distance.max(0.0),
                decay: light.decay,
            }),
        };

        Ok(Node {
            name: self.name,
            transform,
            kind,
            children: self
                .children
                .into_iter()
                .map(ObjectDescription::build)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl MeshDescription {
    fn build(self) -> Result<MeshObject, SceneError> {
        let m = self.material;
        if !(0.0..=1.0).contains(&m.opacity) {
            return Err(SceneError::Invalid(format!(
                "material opacity must be within [0, 1], got {}",
                m.opacity
            )));
        }

        let geometry = match self.geometry {
            Some(GeometryDescription::Cube { size }) => {
                Geometry::from_mesh(&Mesh::cube(size)).map(Arc::new)
            }
            None => None,
        };

        Ok(MeshObject {
            geometry,
            material: Material {
                shading: m.shading,
                color: color(m.color, "material")?,
                emissive: color(m.emissive, "emissive")?,
                specular: color(m.specular, "specular")?,
                shininess: m.shininess.max(0.0),
                opacity: m.opacity,
                transparent: m.transparent,
                side: m.side,
            },
            cast_shadow: self.cast_shadow,
            receive_shadow: self.receive_shadow,
        })
    }
}
