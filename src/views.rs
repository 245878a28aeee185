use axum::response::Html;

pub const ALERT_MSG_GENERIC: &str =
    "Something went wrong. Please try again, and contact us if problem persists.";

/// Bootstrap-style alert levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Error,
    Warning,
    Info,
    Success,
}

impl AlertLevel {
    fn css_class(self) -> &'static str {
        match self {
            AlertLevel::Error => "danger",
            AlertLevel::Warning => "warning",
            AlertLevel::Info => "info",
            AlertLevel::Success => "success",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            message: message.into(),
        }
    }

    pub fn generic() -> Self {
        Self::error(ALERT_MSG_GENERIC)
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps `body` (already escaped HTML) in the site layout.
pub fn layout(title: &str, alert: Option<&Alert>, body: &str) -> Html<String> {
    let alert = alert
        .map(|a| {
            format!(
                r#"<div class="alert alert-{}" role="alert">{}</div>"#,
                a.level.css_class(),
                escape(&a.message)
            )
        })
        .unwrap_or_default();
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title} | gophr.com</title>
</head>
<body>
  <nav>
    <a href="/">Home</a> <a href="/contact">Contact</a> <a href="/faq">FAQ</a>
    <a href="/login">Log In</a> <a href="/signup">Sign Up</a>
  </nav>
  <main>
    {alert}
    {body}
  </main>
</body>
</html>
"#,
        title = escape(title),
    ))
}

pub fn signup_form(name: &str, email: &str) -> String {
    format!(
        r#"<h1>Sign Up Now!</h1>
    <form action="/signup" method="POST">
      <label for="name">Name</label>
      <input type="text" name="name" id="name" value="{}">
      <label for="email">Email address</label>
      <input type="email" name="email" id="email" value="{}">
      <label for="password">Password</label>
      <input type="password" name="password" id="password">
      <button type="submit">Sign Up</button>
    </form>"#,
        escape(name),
        escape(email)
    )
}

pub fn login_form(email: &str) -> String {
    format!(
        r#"<h1>Welcome Back!</h1>
    <form action="/login" method="POST">
      <label for="email">Email address</label>
      <input type="email" name="email" id="email" value="{}">
      <label for="password">Password</label>
      <input type="password" name="password" id="password">
      <button type="submit">Log In</button>
    </form>"#,
        escape(email)
    )
}
