//! Build-step events rendered into images.

mod apt;
mod config;
mod finish;
mod home;
mod package_files;
mod virtualenv;

pub use apt::AptEvent;
pub use config::{ConfigEvent, IniConfig};
pub use finish::FinishEvent;
pub use home::HomeEvent;
pub use package_files::PackageFilesEvent;
pub use virtualenv::{LocalPackage, Requirement, Revision, VirtualenvEvent};
