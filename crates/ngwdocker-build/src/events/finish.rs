use indexmap::IndexMap;

use crate::error::Result;
use crate::event::{Dispatched, Event, EventKind, Renderable};
use crate::image::Image;

/// Last step of an image recipe; handlers append instructions and
/// environment variables.
#[derive(Debug, Clone)]
pub struct FinishEvent {
    image: String,
    pub lines: Vec<String>,
    pub environment: IndexMap<String, String>,
}

impl FinishEvent {
    pub fn new(image: &Image) -> Self {
        Self {
            image: image.name().to_owned(),
            lines: Vec::new(),
            environment: IndexMap::new(),
        }
    }
}

impl Event for FinishEvent {
    fn image(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> EventKind {
        EventKind::Finish
    }
}

impl Renderable for FinishEvent {
    fn render(self, image: &mut Image, _proof: Dispatched) -> Result<()> {
        image.write(self.lines);
        image.environment.extend(self.environment);
        Ok(())
    }
}
