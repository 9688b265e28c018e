mod build;
mod inspect;
mod status;

pub use build::{build_sound_data, BuildSoundDataArgs};
pub use inspect::{inspect_media_asset, InspectMediaArgs};
pub use status::{show_status, StatusArgs};
