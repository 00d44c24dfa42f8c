use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the list status on the left and a hint on the right
pub fn draw_footer(frame: &mut Frame, area: Rect, status: &str, hint: &str) {
  let spans = vec![
    Span::styled(format!(" {} ", status), Style::default().fg(Color::Cyan).bold()),
    Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
    Span::styled(hint.to_string(), Style::default().fg(Color::DarkGray)),
  ];

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
