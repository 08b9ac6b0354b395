//! Server-rendered HTML pages.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use authgate_providers::AuthorizationRequest;

/// Props shared by every page and the client config endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonProps {
    /// Public application URL.
    pub app_url: Option<String>,
    /// Title shown on the login page.
    pub app_title: Option<String>,
    /// Gateway base path.
    pub app_gateway_relative_uri: String,
    /// Support link shown in the page footer.
    pub support_link: Option<String>,
}

/// One OAuth vendor's client-side login parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProps {
    /// Authorization request description.
    #[serde(flatten)]
    pub request: AuthorizationRequest,
    /// Anti-CSRF nonce to send as `state`.
    pub auth_state: String,
}

/// Login methods offered on the login page.
#[derive(Debug, Clone, Serialize)]
pub struct LoginProviders {
    /// E-mail magic link enabled.
    pub email: bool,
    /// Phone login enabled. Always false.
    pub phone: bool,
    /// OAuth vendors keyed by provider kind.
    #[serde(flatten)]
    pub oauth: BTreeMap<String, ProviderProps>,
}

/// Login-page specific props.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPageProps {
    /// Offered login methods.
    pub providers: LoginProviders,
    /// Login step, `email2` after the e-mail was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Address the login e-mail went to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entered_email: Option<String>,
    /// Pending original URL, posted along with the e-mail form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

/// Everything the login page needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProps {
    /// Shared props.
    pub common_props: CommonProps,
    /// Login-page props.
    pub login_page_props: LoginPageProps,
}

/// Escape text for HTML element and attribute content.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn layout(title: &str, support_link: Option<&str>, body: &str) -> String {
    let support = support_link
        .map(|link| format!("<small><a href=\"{}\">Support</a></small>", escape(link)))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title>{title}</title></head>\n\
         <body>\n\
         <main style=\"font-family: sans-serif; display: flex; justify-content: center\">\n\
         <div style=\"background: rgba(0,0,0,0.06); max-width: 600px; border: solid 1px rgba(0,0,0,0.26); padding: 2em\">\n\
         {body}\n\
         <div style=\"display: flex; flex-direction: column; align-items: center\"><hr>{support}</div>\n\
         </div>\n\
         </main>\n\
         </body>\n\
         </html>\n",
        title = escape(title),
    )
}

/// Render the error page.
#[must_use]
pub fn error_page(message: &str, gateway_uri: &str, support_link: Option<&str>) -> String {
    let body = format!(
        "<section><h2>{}</h2><hr><a href=\"{}/login\">Login again</a></section>",
        escape(message),
        escape(gateway_uri),
    );
    layout(message, support_link, &body)
}

/// Render the login page.
#[must_use]
pub fn login_page(props: &ClientProps) -> String {
    let common = &props.common_props;
    let login = &props.login_page_props;
    let base = escape(&common.app_gateway_relative_uri);
    let email_second_step =
        login.step.as_deref() == Some("email2") && login.entered_email.is_some();

    let mut body = String::from("<div style=\"text-align: center\">");
    if let Some(title) = &common.app_title {
        let _ = write!(body, "<h2>{}</h2>", escape(title));
    }
    body.push_str(
        "<h4 style=\"color: orange\">Access is restricted to authenticated users only.</h4></div>",
    );

    if !email_second_step && !login.providers.oauth.is_empty() {
        body.push_str("<div><h4>Use social login</h4>");
        for provider in login.providers.oauth.values() {
            let _ = write!(
                body,
                "<div><a href=\"{}\"><button>Login with {}</button></a></div>",
                escape(&provider.request.authorization_url(&provider.auth_state)),
                escape(&provider.request.name),
            );
        }
        body.push_str("</div>");
    }

    if login.providers.email {
        body.push_str("<div>");
        if email_second_step {
            let entered = login.entered_email.as_deref().unwrap_or_default();
            let _ = write!(
                body,
                "<form method=\"POST\" action=\"{base}/auth-token\">\
                 <p>We've sent a token and a link to {}. Check your e-mail and either \
                 click the link or enter the token below.</p>\
                 <input name=\"token\" placeholder=\"token from e-mail\">\
                 <input type=\"submit\">\
                 <a href=\"{base}/login\">back to other login options</a>\
                 </form>",
                escape(entered),
            );
        } else {
            let original_url = login
                .original_url
                .as_deref()
                .map(|url| {
                    format!(
                        "<input type=\"hidden\" name=\"originalUrl\" value=\"{}\">",
                        escape(url)
                    )
                })
                .unwrap_or_default();
            let _ = write!(
                body,
                "<h4>Send me magic link / code with e-mail</h4>\
                 <form method=\"POST\" action=\"{base}/start-auth-email\">\
                 <input type=\"email\" name=\"email\" placeholder=\"email\" required>\
                 {original_url}\
                 <input type=\"submit\">\
                 </form>",
            );
        }
        body.push_str("</div>");
    }

    let title = common.app_title.as_deref().unwrap_or("Login");
    layout(title, common.support_link.as_deref(), &body)
}
