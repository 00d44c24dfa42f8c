mod input;
mod key_result;
mod prompt;
mod search_input;
mod toast;

pub use key_result::KeyResult;
pub use prompt::{Prompt, PromptEvent};
pub use search_input::SearchInput;
pub use toast::{ToastLevel, Toasts};
