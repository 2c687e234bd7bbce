use crate::error::Result;
use crate::event::{Dispatched, Event, EventKind, Renderable};
use crate::image::Image;

/// A batch of apt operations rendered as a single `RUN` instruction.
#[derive(Debug, Clone)]
pub struct AptEvent {
    image: String,
    kind: EventKind,
    pub packages: Vec<String>,
    pub commands: Vec<String>,
    pub cleanup: Vec<String>,
}

impl AptEvent {
    pub fn new(image: &Image) -> Self {
        Self::with_kind(image, EventKind::Apt)
    }

    /// The common package layer every image starts with.
    pub fn bootstrap(image: &Image) -> Self {
        Self::with_kind(image, EventKind::Bootstrap)
    }

    fn with_kind(image: &Image, kind: EventKind) -> Self {
        Self {
            image: image.name().to_owned(),
            kind,
            packages: Vec::new(),
            commands: vec![
                "export DEBIAN_FRONTEND=noninteractive".to_owned(),
                "apt-get update".to_owned(),
            ],
            cleanup: vec!["rm -rf /var/lib/apt/lists/*".to_owned()],
        }
    }

    /// Trust the repository signing key published at `url`.
    pub fn add_key(&mut self, url: &str) {
        self.commands.push(format!(
            "curl --silent {url} | APT_KEY_DONT_WARN_ON_DANGEROUS_USAGE=DontWarn \
             apt-key add - > /dev/null"
        ));
    }

    pub fn add_repository(&mut self, repo: &str) {
        self.commands
            .push(format!("add-apt-repository --yes \"{repo}\""));
    }

    pub fn package<I, S>(&mut self, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(packages.into_iter().map(Into::into));
    }

    /// Flush the packages collected so far into their own install command,
    /// so later commands can run between two install batches.
    pub fn pop(&mut self) {
        if self.packages.is_empty() {
            return;
        }
        self.commands.push(format!(
            "apt-get --yes -qq install --no-install-recommends \n    {}",
            self.packages.join(" ")
        ));
        self.packages.clear();
    }

    pub fn command<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    pub fn cleanup<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleanup.extend(commands.into_iter().map(Into::into));
    }

    /// Every command in render order, pending packages included.
    pub fn all_commands(&mut self) -> Vec<String> {
        self.pop();
        self.commands.iter().chain(&self.cleanup).cloned().collect()
    }
}

impl Event for AptEvent {
    fn image(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> EventKind {
        self.kind
    }
}

impl Renderable for AptEvent {
    fn render(mut self, image: &mut Image, _proof: Dispatched) -> Result<()> {
        let commands = self.all_commands();
        image.run(commands, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::image::{Owner, Profile};
    use ngwdocker_core::Mode;

    fn image() -> Image {
        let profile = Profile {
            mode: Mode::Production,
            python3: true,
            default_instance: true,
            owner: Owner::DEFAULT,
        };
        Image::new("postgres", "/nonexistent", profile)
    }

    #[test]
    fn pop_splits_install_batches() {
        let image = image();
        let mut apt = AptEvent::new(&image);
        apt.package(["postgresql-common", "locales"]);
        apt.pop();
        apt.command(["localedef -i en_US -c -f UTF-8 en_US.UTF-8"]);
        apt.package(["postgresql-10"]);
        apt.cleanup(["userdel postgres"]);

        let commands = apt.all_commands();
        assert_eq!(
            commands,
            vec![
                "export DEBIAN_FRONTEND=noninteractive",
                "apt-get update",
                "apt-get --yes -qq install --no-install-recommends \n    postgresql-common locales",
                "localedef -i en_US -c -f UTF-8 en_US.UTF-8",
                "apt-get --yes -qq install --no-install-recommends \n    postgresql-10",
                "rm -rf /var/lib/apt/lists/*",
                "userdel postgres",
            ]
        );
    }

    #[test]
    fn pop_without_packages_is_noop() {
        let image = image();
        let mut apt = AptEvent::new(&image);
        apt.pop();
        assert_eq!(apt.commands.len(), 2);
    }

    #[test]
    fn render_emits_one_instruction() {
        let mut image = image();
        let bus = EventBus::new();
        let mut apt = AptEvent::new(&image);
        apt.add_key("https://example.com/key.asc");
        apt.add_repository("ppa:nextgis/ppa");
        apt.package(["zstd"]);

        bus.notify(apt).unwrap().render(&mut image).unwrap();

        assert_eq!(image.lines().len(), 2);
        let run = &image.lines()[0];
        assert!(run.starts_with("RUN set -ex; \\\n    export DEBIAN_FRONTEND=noninteractive"));
        assert!(run.contains("curl --silent https://example.com/key.asc | "));
        assert!(run.contains("add-apt-repository --yes \"ppa:nextgis/ppa\""));
        assert!(run.contains("--no-install-recommends  \\\n        zstd"));
        assert!(run.ends_with("rm -rf /var/lib/apt/lists/*"));
        assert!(image.lines()[1].is_empty());
    }

    #[test]
    fn handlers_can_add_packages() {
        let mut image = image();
        let mut bus = EventBus::new();
        bus.subscribe::<AptEvent, _>("postgres", EventKind::Apt, |apt| {
            apt.package(["postgresql-10-pgrouting"]);
            Ok(())
        });

        let apt = AptEvent::new(&image);
        bus.notify(apt).unwrap().render(&mut image).unwrap();

        assert!(image.lines()[0].contains("postgresql-10-pgrouting"));
    }
}
