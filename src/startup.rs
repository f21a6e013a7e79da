use crate::config::Config;
use anyhow::{Context, Result};
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub irma: bool,
    pub gateways: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.irma && self.gateways
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("IRMA Server:           {}", status(self.irma));
        println!("Bank Gateways:         {}", status(self.gateways));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        irma: true,
        gateways: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_irma(&config.irma_server_url).await {
        report.irma = false;
        report.errors.push(format!("IRMA: {}", e));
    }

    for (name, url) in gateway_urls(config) {
        if let Err(e) = validate_gateway(url).await {
            report.gateways = false;
            report.errors.push(format!("{} gateway: {}", name, e));
        }
    }

    Ok(report)
}

fn gateway_urls(config: &Config) -> Vec<(&'static str, &str)> {
    let mut urls = Vec::new();
    if let Some(ideal) = &config.ideal {
        urls.push(("iDEAL", ideal.gateway_url.as_str()));
    }
    if let Some(idin) = &config.idin {
        urls.push(("iDIN", idin.gateway_url.as_str()));
    }
    urls
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.ideal.is_none() && config.idin.is_none() {
        anyhow::bail!("at least one of IDEAL_ENABLED and IDIN_ENABLED must be set");
    }

    url::Url::parse(&config.irma_server_url).context("IRMA_SERVER_URL is not a valid URL")?;
    for (name, gateway) in gateway_urls(config) {
        url::Url::parse(gateway)
            .with_context(|| format!("{} gateway URL is not a valid URL", name))?;
    }

    if let Some(ideal) = &config.ideal {
        if ideal.payment_amounts.is_empty() {
            anyhow::bail!("IDEAL_PAYMENT_AMOUNTS is empty");
        }
        if let Some(redirect) = &ideal.redirect_url {
            url::Url::parse(redirect).context("IDEAL_REDIRECT_URL is not a valid URL")?;
        }
    }

    Ok(())
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?)
}

// Any HTTP answer means the server is up; the root path is not an API route.
async fn validate_irma(irma_url: &str) -> Result<()> {
    http_client()?
        .get(irma_url)
        .send()
        .await
        .context("Failed to connect to IRMA server")?;
    Ok(())
}

async fn validate_gateway(gateway_url: &str) -> Result<()> {
    let url = format!("{}/directory", gateway_url.trim_end_matches('/'));
    let response = http_client()?
        .get(&url)
        .send()
        .await
        .context("Failed to connect to bank gateway")?;

    if !response.status().is_success() {
        anyhow::bail!("directory returned status: {}", response.status());
    }

    Ok(())
}
