use indexmap::IndexMap;

use crate::event::{Event, EventKind};
use crate::image::Image;

/// Default INI configuration baked into an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniConfig {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl IniConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, section: &str, option: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_owned())
            .or_default()
            .insert(option.to_owned(), value.into());
    }

    pub fn unset(&mut self, section: &str, option: &str) {
        if let Some(options) = self.sections.get_mut(section) {
            options.shift_remove(option);
        }
    }

    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|options| options.get(option))
            .map(String::as_str)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (section, options) in &self.sections {
            out.push_str(&format!("[{section}]\n"));
            for (option, value) in options {
                out.push_str(&format!("{option} = {value}\n"));
            }
            out.push('\n');
        }
        out
    }
}

/// Lets handlers adjust an image's default configuration before it is
/// written.
#[derive(Debug, Clone)]
pub struct ConfigEvent {
    image: String,
    pub config: IniConfig,
}

impl ConfigEvent {
    pub fn new(image: &Image, config: IniConfig) -> Self {
        Self {
            image: image.name().to_owned(),
            config,
        }
    }
}

impl Event for ConfigEvent {
    fn image(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> EventKind {
        EventKind::Config
    }
}
