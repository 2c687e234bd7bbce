use std::path::PathBuf;

use crate::event::{Event, EventKind};
use crate::image::Image;

/// Files of a local package staged into a development image.
///
/// Development images only carry the packaging metadata of each local
/// package, since sources are bind-mounted at run time. Handlers add any
/// other file the install step needs. Relative paths are resolved
/// against the package directory.
#[derive(Debug, Clone)]
pub struct PackageFilesEvent {
    image: String,
    pub package: String,
    pub files: Vec<PathBuf>,
}

impl PackageFilesEvent {
    pub fn new(image: &Image, package: &str) -> Self {
        Self {
            image: image.name().to_owned(),
            package: package.to_owned(),
            files: Vec::new(),
        }
    }

    pub fn add<I, P>(&mut self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(files.into_iter().map(Into::into));
    }
}

impl Event for PackageFilesEvent {
    fn image(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> EventKind {
        EventKind::PackageFiles
    }
}
