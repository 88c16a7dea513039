use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::auth::Credentials;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{PptContent, PptList, UserInfo, WeekSchedules};

/// REST client for the classroom platform, authenticated with browser cookies.
pub struct ClassroomClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl ClassroomClient {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let mut headers = browser_headers(config)?;
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", credentials.token))?,
        );
        headers.insert(header::COOKIE, HeaderValue::from_str(&credentials.cookie_header)?);

        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Trades a one-time CAS login code for session cookies.
    /// GET /casapi/index.php?r=auth/login
    pub async fn login_with_code(config: &Config, code: &str) -> Result<Credentials> {
        let base_url = config.base_url.trim_end_matches('/');
        let client = Client::builder()
            .default_headers(browser_headers(config)?)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(Policy::none())
            .build()?;

        let forward = format!("{base_url}/coursepage");
        let response = client
            .get(format!("{base_url}/casapi/index.php"))
            .query(&[("r", "auth/login"), ("forward", forward.as_str()), ("code", code)])
            .send()
            .await?;

        let status = response.status();
        let set_cookies: Vec<&str> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        tracing::debug!(%status, cookies = set_cookies.len(), "Login response received");

        if set_cookies.is_empty() && !status.is_redirection() && !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Credentials::from_set_cookies(set_cookies)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /userapi/v1/infosimple
    pub async fn info_simple(&self) -> Result<UserInfo> {
        let response = self.client.get(self.url("/userapi/v1/infosimple")).send().await?;
        handle_response(response).await
    }

    /// GET /courseapi/v2/schedule/get-week-schedules
    pub async fn week_schedules(
        &self,
        user_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<WeekSchedules> {
        let user_id = user_id.to_string();
        let response = self
            .client
            .get(self.url("/courseapi/v2/schedule/get-week-schedules"))
            .query(&[
                ("user_id", user_id.as_str()),
                ("tenant_id", self.credentials.tenant_code.as_str()),
                ("start_at", start_date),
                ("end_at", end_date),
                ("token", self.credentials.token.as_str()),
            ])
            .send()
            .await?;
        handle_response(response).await
    }

    /// GET /pptnote/v1/schedule/search-ppt
    ///
    /// Entries whose `content` is not valid JSON come back empty so that list
    /// positions are preserved.
    pub async fn search_ppt(
        &self,
        course_id: i64,
        sub_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PptContent>> {
        let response = self
            .client
            .get(self.url("/pptnote/v1/schedule/search-ppt"))
            .query(&[
                ("course_id", course_id.to_string()),
                ("sub_id", sub_id.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await?;
        let list: PptList = handle_response(response).await?;

        Ok(list
            .list
            .into_iter()
            .map(|item| match serde_json::from_str::<PptContent>(&item.content) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(content = %item.content, "Unreadable PPT entry: {e}");
                    PptContent::default()
                }
            })
            .collect())
    }

    /// Downloads a slide image.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.bytes().await?)
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    let deserializer = &mut serde_json::Deserializer::from_str(&body);
    serde_path_to_error::deserialize(deserializer).map_err(|e| Error::Json {
        path: e.path().to_string(),
        source: e.into_inner(),
    })
}

/// Headers the web client sends on every API call.
fn browser_headers(config: &Config) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("zh_cn"));
    for (name, value) in [
        ("sec-ch-ua-platform", "\"macOS\""),
        (
            "sec-ch-ua",
            "\"Google Chrome\";v=\"135\", \"Not-A.Brand\";v=\"8\", \"Chromium\";v=\"135\"",
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-fetch-site", "same-origin"),
        ("sec-fetch-mode", "cors"),
        ("sec-fetch-dest", "empty"),
        ("priority", "u=1, i"),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    Ok(headers)
}
