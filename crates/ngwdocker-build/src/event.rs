//! Publish/subscribe hooks around image build steps.
//!
//! Every build step is an event object. The image recipe fills it in,
//! hands it to [`EventBus::notify`] so that handlers registered by
//! packages can adjust it, and then renders the returned [`Notified`]
//! wrapper into the image:
//!
//! ```text
//! AptEvent::new(image) ── package(...) ── bus.notify(apt)? ── .render(image)?
//!        constructed         mutated          handlers run       consumed
//! ```
//!
//! Only a [`Notified`] event can be rendered and rendering consumes it,
//! so an event is never rendered before its handlers ran or twice.
//!
//! ```compile_fail
//! # use ngwdocker_build::events::AptEvent;
//! # use ngwdocker_build::{Image, Renderable};
//! fn skip_handlers(image: &mut Image) {
//!     let apt = AptEvent::new(image);
//!     apt.render(image);
//! }
//! ```
//!
//! ```compile_fail
//! # use ngwdocker_build::events::AptEvent;
//! # use ngwdocker_build::{EventBus, Image, Result};
//! fn render_twice(bus: &EventBus, image: &mut Image) -> Result<()> {
//!     let apt = bus.notify(AptEvent::new(image))?;
//!     apt.render(image)?;
//!     apt.render(image)
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::{BuildError, HandlerError, Result};
use crate::image::Image;

/// Build step an event belongs to. Handlers subscribe per image and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Common packages installed by every image before its own steps
    Bootstrap,
    Apt,
    Home,
    Virtualenv,
    PackageFiles,
    Config,
    Finish,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bootstrap => "bootstrap",
            Self::Apt => "apt",
            Self::Home => "home",
            Self::Virtualenv => "virtualenv",
            Self::PackageFiles => "package-files",
            Self::Config => "config",
            Self::Finish => "finish",
        })
    }
}

/// An event that can be broadcast on the [`EventBus`].
pub trait Event: Any {
    /// Name of the image this event belongs to.
    fn image(&self) -> &str;

    fn kind(&self) -> EventKind;
}

/// An event whose accumulated state flushes into image instructions.
pub trait Renderable: Event + Sized {
    /// Flush into `image`. The [`Dispatched`] proof can only be produced
    /// by [`Notified::render`].
    fn render(self, image: &mut Image, proof: Dispatched) -> Result<()>;
}

/// Proof that an event went through [`EventBus::notify`].
pub struct Dispatched(());

/// An event whose handlers already ran.
///
/// The original caller may still mutate it through `DerefMut` before
/// rendering.
pub struct Notified<E> {
    event: E,
}

impl<E> Deref for Notified<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.event
    }
}

impl<E> DerefMut for Notified<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.event
    }
}

impl<E: Renderable> Notified<E> {
    pub fn render(self, image: &mut Image) -> Result<()> {
        ensure_image(self.event.image(), image)?;
        self.event.render(image, Dispatched(()))
    }
}

pub(crate) fn ensure_image(expected: &str, image: &Image) -> Result<()> {
    if expected != image.name() {
        return Err(BuildError::ImageMismatch {
            expected: expected.to_owned(),
            actual: image.name().to_owned(),
        });
    }
    Ok(())
}

pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler = Box<dyn Fn(&mut dyn Any) -> HandlerResult>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Topic {
    image: String,
    kind: EventKind,
    event_type: TypeId,
}

/// Handlers keyed by image, event kind, and concrete event type.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<Topic, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of type `E` and `kind` on `image`.
    /// Handlers run in registration order.
    pub fn subscribe<E, F>(&mut self, image: &str, kind: EventKind, handler: F)
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + 'static,
    {
        let topic = Topic {
            image: image.to_owned(),
            kind,
            event_type: TypeId::of::<E>(),
        };
        let handler: Handler = Box::new(move |event: &mut dyn Any| {
            match event.downcast_mut::<E>() {
                Some(event) => handler(event),
                None => Ok(()),
            }
        });
        self.handlers.entry(topic).or_default().push(handler);
    }

    /// Run every matching handler. The first failing handler aborts dispatch.
    pub fn notify<E: Event>(&self, mut event: E) -> Result<Notified<E>> {
        let topic = Topic {
            image: event.image().to_owned(),
            kind: event.kind(),
            event_type: TypeId::of::<E>(),
        };

        if let Some(handlers) = self.handlers.get(&topic) {
            tracing::debug!(
                image = %topic.image,
                kind = %topic.kind,
                handlers = handlers.len(),
                "notifying event handlers"
            );
            for handler in handlers {
                handler(&mut event).map_err(|source| BuildError::Handler {
                    image: topic.image.clone(),
                    kind: topic.kind,
                    source,
                })?;
            }
        }

        Ok(Notified { event })
    }

    pub fn handler_count(&self, image: &str, kind: EventKind) -> usize {
        self.handlers
            .iter()
            .filter(|(topic, _)| topic.image == image && topic.kind == kind)
            .map(|(_, handlers)| handlers.len())
            .sum()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.handlers.len())
            .finish()
    }
}
