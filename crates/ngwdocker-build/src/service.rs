use indexmap::IndexMap;
use serde::Serialize;

/// What a service runs: an image built here, or a pre-built reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceImage {
    /// Name of an image registered in the topology
    Local(String),
    /// Pre-built image reference, used as-is
    External(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Volume,
    Bind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    #[serde(rename = "type")]
    pub kind: MountKind,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Ulimit {
    Single(i64),
    Range { soft: i64, hard: i64 },
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub image: ServiceImage,
    pub command: Option<Vec<String>>,
    pub environment: IndexMap<String, String>,
    pub ulimits: IndexMap<String, Ulimit>,
    pub volumes: Vec<Mount>,
    pub ports: Vec<String>,
    pub depends_on: Vec<String>,
    pub restart: bool,
}

impl Service {
    pub fn new(name: impl Into<String>, image: ServiceImage) -> Self {
        Self {
            name: name.into(),
            image,
            command: None,
            environment: IndexMap::new(),
            ulimits: IndexMap::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            depends_on: Vec::new(),
            restart: false,
        }
    }

    pub fn local(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self::new(name, ServiceImage::Local(image.into()))
    }

    pub fn external(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::new(name, ServiceImage::External(reference.into()))
    }

    pub fn add_volume(&mut self, volume: impl Into<String>, target: impl Into<String>) {
        self.volumes.push(Mount {
            kind: MountKind::Volume,
            source: volume.into(),
            target: target.into(),
        });
    }

    pub fn add_bind(&mut self, path: impl Into<String>, target: impl Into<String>) {
        self.volumes.push(Mount {
            kind: MountKind::Bind,
            source: path.into(),
            target: target.into(),
        });
    }

    pub fn depends_on(&mut self, service: impl Into<String>) {
        self.depends_on.push(service.into());
    }
}
