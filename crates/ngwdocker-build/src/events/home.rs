use crate::error::Result;
use crate::event::{Dispatched, Event, EventKind, Renderable};
use crate::image::Image;

const DEFAULT_USER: &str = "ngw";
const DEFAULT_HOME: &str = "/opt/ngw";

/// Creates the image user and its home directory, then switches to them.
#[derive(Debug, Clone)]
pub struct HomeEvent {
    image: String,
    pub user: String,
    pub home: String,
    pub uid: u32,
    pub gid: u32,
    pub directories: Vec<String>,
    pub commands: Vec<String>,
}

impl HomeEvent {
    pub fn new(image: &Image) -> Self {
        Self::with_user(image, DEFAULT_USER)
    }

    pub fn with_user(image: &Image, user: &str) -> Self {
        let owner = image.profile().owner;
        Self {
            image: image.name().to_owned(),
            user: user.to_owned(),
            home: DEFAULT_HOME.to_owned(),
            uid: owner.uid,
            gid: owner.gid,
            directories: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Subdirectories of the home directory to create.
    pub fn directory<I, S>(&mut self, directories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directories
            .extend(directories.into_iter().map(Into::into));
    }

    /// Extra commands run as root before ownership is fixed up.
    pub fn command<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }
}

impl Event for HomeEvent {
    fn image(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> EventKind {
        EventKind::Home
    }
}

impl Renderable for HomeEvent {
    fn render(self, image: &mut Image, _proof: Dispatched) -> Result<()> {
        image.write([
            format!("ARG NGWUSER={}", self.user),
            format!("ARG NGWROOT={}", self.home),
            String::new(),
        ]);

        let mkdir = std::iter::once("mkdir -p $NGWROOT".to_owned())
            .chain(self.directories.iter().map(|d| format!("$NGWROOT/{d}")))
            .collect::<Vec<_>>()
            .join(" ");

        let mut commands = vec![
            format!("groupadd -g {} $NGWUSER", self.gid),
            format!(
                "useradd --home-dir $NGWROOT -u {} -g $NGWUSER $NGWUSER",
                self.uid
            ),
            mkdir,
        ];
        commands.extend(self.commands);
        commands.push("chown -R $NGWUSER:$NGWUSER $NGWROOT".to_owned());
        image.run(commands, true);

        image.write(["WORKDIR $NGWROOT", "USER $NGWUSER", ""]);

        image
            .environment
            .insert("NGWROOT".to_owned(), "$NGWROOT".to_owned());
        image
            .environment
            .insert("NGWUSER".to_owned(), "$NGWUSER".to_owned());
        Ok(())
    }
}
