pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use renderfns::{draw_footer, draw_header};

const FOOTER_HINT: &str = "j/k:nav  a:add  e:rename  d:delete  r:refresh  /:search  q:quit";

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let api_url = app.api_url().to_string();
  let view = app.view_mut();
  draw_header(frame, chunks[0], &api_url, &view.title(), &view.shortcuts());
  view.render(frame, chunks[1]);
  let status = view.status();
  draw_footer(frame, chunks[2], &status, FOOTER_HINT);

  app.toasts().render(frame, chunks[1]);
}
