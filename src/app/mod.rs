mod state;

pub use state::{App, CardArea, DialogState, FRAME_INTERVAL};
