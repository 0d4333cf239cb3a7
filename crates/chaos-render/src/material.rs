//! Render materials shared between layers, looked up by name

use serde::Deserialize;
use std::collections::HashMap;
use std::rc::Rc;

/// How a material blends into the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Alpha,
    Additive,
    Opaque,
}

impl BlendMode {
    pub fn to_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendMode::Opaque => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderMaterial {
    pub name: String,
    pub blend: BlendMode,
    /// Atlas texture name; sampling is up to the shader bound for this material
    pub texture: Option<String>,
}

impl RenderMaterial {
    pub fn new(name: impl Into<String>, blend: BlendMode) -> Self {
        Self {
            name: name.into(),
            blend,
            texture: None,
        }
    }
}

/// Materials by name
#[derive(Default)]
pub struct MaterialLibrary {
    materials: HashMap<String, Rc<RenderMaterial>>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material, replacing any previous one with the same name
    pub fn insert(&mut self, material: RenderMaterial) -> Rc<RenderMaterial> {
        let material = Rc::new(material);
        self.materials
            .insert(material.name.clone(), Rc::clone(&material));
        material
    }

    pub fn get(&self, name: &str) -> Option<Rc<RenderMaterial>> {
        self.materials.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
