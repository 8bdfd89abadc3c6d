use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::error::DriverError;
use crate::helpers::springahead::{PageDriver, Selector};

const SETTLE_LIMIT: Duration = Duration::from_secs(15);
const POLL: Duration = Duration::from_millis(250);

/// [`PageDriver`] backed by a WebDriver session (chromedriver or similar).
pub struct WebDriverPage {
    client: Client,
    closed: bool,
}

impl WebDriverPage {
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, DriverError> {
        info!(
            "Starting browser session via {} (headless: {})",
            webdriver_url, headless
        );

        let mut args = vec!["--window-size=1400,1000"];
        if headless {
            args.push("--headless=new");
        }
        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .map_err(|e| DriverError::new(format!("could not start WebDriver session: {}", e)))?;

        Ok(Self { client, closed: false })
    }

    async fn find(&self, selector: Selector) -> Result<Element, DriverError> {
        let xpath = xpath_for(selector);
        self.client
            .find(locator(selector, &xpath))
            .await
            .map_err(|e| cmd_error(selector, e))
    }
}

fn xpath_for(selector: Selector) -> String {
    match selector {
        Selector::Css(_) => String::new(),
        // `@value` covers `<input type="submit">` buttons, which have no text node.
        Selector::ExactText(text) => {
            let lit = xpath_literal(text);
            format!("//*[normalize-space(text())={lit} or normalize-space(@value)={lit}]")
        }
        Selector::ContainsText(text) => format!("//*[contains(text(), {})]", xpath_literal(text)),
    }
}

fn locator<'a>(selector: Selector, xpath: &'a str) -> Locator<'a> {
    match selector {
        Selector::Css(css) => Locator::Css(css),
        Selector::ExactText(_) | Selector::ContainsText(_) => Locator::XPath(xpath),
    }
}

fn xpath_literal(text: &str) -> String {
    if text.contains('\'') {
        format!("\"{}\"", text)
    } else {
        format!("'{}'", text)
    }
}

fn cmd_error(selector: Selector, e: CmdError) -> DriverError {
    DriverError::new(format!("{:?}: {}", selector, e))
}

/// A row without the field reads as empty; any other failure is real.
fn missing_field(field: Selector, e: CmdError) -> Result<String, DriverError> {
    if e.is_no_such_element() {
        Ok(String::new())
    } else {
        Err(cmd_error(field, e))
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.client
            .goto(url)
            .await
            .map_err(|e| DriverError::new(format!("navigation to {} failed: {}", url, e)))
    }

    async fn wait_for(&mut self, selector: Selector, timeout: Duration) -> Result<bool, DriverError> {
        let xpath = xpath_for(selector);
        debug!("Waiting up to {:?} for {:?}", timeout, selector);
        match self
            .client
            .wait()
            .at_most(timeout)
            .every(POLL)
            .for_element(locator(selector, &xpath))
            .await
        {
            Ok(_) => Ok(true),
            Err(CmdError::WaitTimeout) => Ok(false),
            Err(e) => Err(cmd_error(selector, e)),
        }
    }

    async fn fill(&mut self, selector: Selector, value: &str) -> Result<(), DriverError> {
        let element = self.find(selector).await?;
        element.clear().await.map_err(|e| cmd_error(selector, e))?;
        element.send_keys(value).await.map_err(|e| cmd_error(selector, e))
    }

    async fn click(&mut self, selector: Selector) -> Result<(), DriverError> {
        let element = self.find(selector).await?;
        element.click().await.map_err(|e| cmd_error(selector, e))
    }

    async fn is_visible(&mut self, selector: Selector) -> Result<bool, DriverError> {
        let xpath = xpath_for(selector);
        let found = self
            .client
            .find_all(locator(selector, &xpath))
            .await
            .map_err(|e| cmd_error(selector, e))?;
        for element in found {
            if element.is_displayed().await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn settle(&mut self) -> Result<(), DriverError> {
        let deadline = Instant::now() + SETTLE_LIMIT;
        loop {
            let state = self
                .client
                .execute("return document.readyState", vec![])
                .await
                .map_err(|e| DriverError::new(format!("readyState check failed: {}", e)))?;
            if state.as_str() == Some("complete") || Instant::now() >= deadline {
                break;
            }
            sleep(POLL).await;
        }
        // readyState does not cover XHR-driven redraws.
        sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn pause(&mut self, duration: Duration) {
        sleep(duration).await;
    }

    async fn read_rows(
        &mut self,
        row: Selector,
        fields: &[Selector],
    ) -> Result<Vec<Vec<String>>, DriverError> {
        let row_xpath = xpath_for(row);
        let rows = self
            .client
            .find_all(locator(row, &row_xpath))
            .await
            .map_err(|e| cmd_error(row, e))?;

        let mut out = Vec::with_capacity(rows.len());
        for element in rows {
            let mut values = Vec::with_capacity(fields.len());
            for &field in fields {
                let field_xpath = match field {
                    // Relative to the row element.
                    Selector::Css(_) => String::new(),
                    _ => format!(".{}", xpath_for(field)),
                };
                let text = match element.find(locator(field, &field_xpath)).await {
                    Ok(cell) => cell.text().await.unwrap_or_default(),
                    Err(e) => missing_field(field, e)?,
                };
                values.push(text.trim().to_string());
            }
            out.push(values);
        }
        Ok(out)
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        let png = self
            .client
            .screenshot()
            .await
            .map_err(|e| DriverError::new(format!("screenshot failed: {}", e)))?;
        tokio::fs::write(path, png)
            .await
            .map_err(|e| DriverError::new(format!("writing {}: {}", path.display(), e)))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Closing browser session");
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::new(format!("closing session: {}", e)))
    }
}
