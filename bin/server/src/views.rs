//! Server-rendered HTML pages.
//!
//! Templates are compiled into the binary and rendered with Tera, which
//! escapes every interpolated value.

use std::fmt;
use std::sync::LazyLock;

use gatehouse_accounts::{AuthConfig, Provider, User};
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATES: [(&str, &str); 10] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("messages.html", include_str!("../templates/messages.html")),
    ("links.html", include_str!("../templates/links.html")),
    ("landing.html", include_str!("../templates/landing.html")),
    ("sign_in.html", include_str!("../templates/sign_in.html")),
    ("sign_up.html", include_str!("../templates/sign_up.html")),
    ("edit_account.html", include_str!("../templates/edit_account.html")),
    ("forgot_password.html", include_str!("../templates/forgot_password.html")),
    ("reset_password.html", include_str!("../templates/reset_password.html")),
    ("error.html", include_str!("../templates/error.html")),
];

static VIEWS: LazyLock<Result<Tera, String>> = LazyLock::new(|| load().map_err(|e| describe(&e)));

/// A page that could not be rendered.
#[derive(Debug)]
pub struct ViewError {
    template: &'static str,
    details: String,
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to render '{}': {}", self.template, self.details)
    }
}

impl std::error::Error for ViewError {}

/// Parses every page template.
///
/// The server calls this at startup so a broken template stops it there
/// instead of on the first request.
///
/// # Errors
///
/// Returns the Tera error of the first template that fails to parse.
pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES)?;
    Ok(tera)
}

// Tera keeps the useful part of an error in its source chain.
fn describe(err: &tera::Error) -> String {
    let mut details = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        details.push_str(": ");
        details.push_str(&cause.to_string());
        source = cause.source();
    }
    details
}

fn render(template: &'static str, context: &Context) -> Result<String, ViewError> {
    let tera = VIEWS.as_ref().map_err(|details| ViewError {
        template,
        details: details.clone(),
    })?;
    tera.render(template, context).map_err(|e| ViewError {
        template,
        details: describe(&e),
    })
}

fn page(title: &str, message_class: &str, messages: &[String]) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("message_class", message_class);
    context.insert("messages", messages);
    context
}

#[derive(Serialize)]
struct ProviderLink {
    name: &'static str,
    label: &'static str,
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Kakao => "Kakao",
        Provider::Naver => "Naver",
    }
}

/// Adds the links to the other forms, leaving out the current one.
fn insert_links(context: &mut Context, config: &AuthConfig, current: &str) {
    context.insert(
        "sign_in_link",
        &(config.database_authenticatable && current != "sign_in"),
    );
    context.insert("sign_up_link", &(config.registerable && current != "sign_up"));
    context.insert(
        "password_link",
        &(config.recoverable && config.database_authenticatable && current != "password"),
    );

    let providers: Vec<ProviderLink> = config
        .omniauth_providers()
        .into_iter()
        .map(|provider| ProviderLink {
            name: provider.as_str(),
            label: provider_label(provider),
        })
        .collect();
    context.insert("providers", &providers);
}

/// Landing page, shown signed in or not.
pub fn landing(user: Option<&User>, config: &AuthConfig) -> Result<String, ViewError> {
    let mut context = page("Home", "notice", &[]);
    context.insert(
        "signed_in_as",
        &user.map(|user| user.name().unwrap_or(user.email())),
    );
    context.insert("edit_link", &config.registerable);
    insert_links(&mut context, config, "");
    render("landing.html", &context)
}

/// Sign-in form.
pub fn sign_in(config: &AuthConfig, email: &str, alerts: &[String]) -> Result<String, ViewError> {
    let mut context = page("Log in", "alert", alerts);
    context.insert("password_form", &config.database_authenticatable);
    context.insert("remember_me", &config.rememberable);
    context.insert("email", email);
    insert_links(&mut context, config, "sign_in");
    render("sign_in.html", &context)
}

/// Sign-up form.
pub fn sign_up(
    config: &AuthConfig,
    email: &str,
    name: &str,
    errors: &[String],
) -> Result<String, ViewError> {
    let mut context = page("Sign up", "errors", errors);
    context.insert("email", email);
    context.insert("name", name);
    context.insert("password_min_length", &config.password_min_length);
    insert_links(&mut context, config, "sign_up");
    render("sign_up.html", &context)
}

/// Account edit form.
pub fn edit_account(user: &User, errors: &[String]) -> Result<String, ViewError> {
    let mut context = page("Edit account", "errors", errors);
    context.insert("email", user.email());
    context.insert("name", user.name().unwrap_or_default());
    render("edit_account.html", &context)
}

/// Form asking for the email to send reset instructions to.
pub fn forgot_password(config: &AuthConfig, notices: &[String]) -> Result<String, ViewError> {
    let mut context = page("Forgot your password?", "notice", notices);
    insert_links(&mut context, config, "password");
    render("forgot_password.html", &context)
}

/// Form choosing a new password with a reset token.
pub fn reset_password(token: &str, errors: &[String]) -> Result<String, ViewError> {
    let mut context = page("Change your password", "errors", errors);
    context.insert("reset_password_token", token);
    render("reset_password.html", &context)
}

/// Page shown when a provider sign-in fails.
pub fn provider_failure(
    config: &AuthConfig,
    provider: Option<&str>,
    reason: &str,
) -> Result<String, ViewError> {
    let message = match provider {
        Some(provider) => format!(
            "Could not authenticate you from {} because \"{}\".",
            provider, reason
        ),
        None => format!("Could not authenticate you because \"{}\".", reason),
    };
    sign_in(config, "", &[message])
}

/// Generic error page.
pub fn error_page(title: &str, messages: &[String]) -> Result<String, ViewError> {
    render("error.html", &page(title, "errors", messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_parses() {
        let tera = load().expect("templates");

        for (name, _) in TEMPLATES {
            assert!(tera.get_template_names().any(|loaded| loaded == name), "{name}");
        }
    }

    #[test]
    fn landing_escapes_user_name() {
        let mut user = User::new("eve@example.com".to_string(), String::new());
        user.set_name(Some("<script>".to_string()));

        let page = landing(Some(&user), &AuthConfig::default()).expect("render");

        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains(r#"action="/users/sign_out""#));
    }

    #[test]
    fn landing_offers_sign_in_when_signed_out() {
        let page = landing(None, &AuthConfig::default()).expect("render");

        assert!(page.contains("Welcome"));
        assert!(page.contains(r#"href="/users/sign_in""#));
        assert!(!page.contains("/users/sign_out"));
    }

    #[test]
    fn sign_in_lists_enabled_providers() {
        let config = AuthConfig::default().with_omniauth_providers(&[Provider::Naver]);

        let page = sign_in(&config, "", &[]).expect("render");

        assert!(page.contains(r#"action="/users/auth/naver""#));
        assert!(page.contains("Sign in with Naver"));
        assert!(!page.contains(r#"action="/users/auth/kakao""#));
    }

    #[test]
    fn sign_in_hides_disabled_links() {
        let config = AuthConfig {
            registerable: false,
            rememberable: false,
            ..AuthConfig::default()
        };

        let page = sign_in(&config, "", &[]).expect("render");

        assert!(!page.contains("/users/sign_up"));
        assert!(!page.contains("remember_me"));
        assert!(page.contains("/users/password/new"));
    }

    #[test]
    fn submitted_values_are_escaped_in_attributes() {
        let page = sign_up(
            &AuthConfig::default(),
            r#""><script>"#,
            "Tom & Jerry",
            &["Email is invalid".to_string()],
        )
        .expect("render");

        assert!(page.contains("&quot;&gt;&lt;script&gt;"));
        assert!(page.contains("Tom &amp; Jerry"));
        assert!(page.contains(r#"<ul class="errors"><li>Email is invalid</li></ul>"#));
    }

    #[test]
    fn error_page_without_messages_has_no_list() {
        let page = error_page("Not found", &[]).expect("render");

        assert!(page.contains("<title>Not found | Gatehouse</title>"));
        assert!(!page.contains("<ul"));
    }
}
