//! Ordered lookup strategies for controls whose markup varies.

use std::time::Duration;

use tracing::debug;

use super::driver::{DriverResult, Locator, PortalDriver};
use super::selectors::{DETAILS_BUTTON, DETAILS_LABEL};

/// One way of finding an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Direct lookup.
    Locate(Locator),
    /// Scan every match of the locator for one whose `value` attribute equals the label.
    ScanValue { candidates: Locator, value: String },
}

impl Strategy {
    async fn resolve<D: PortalDriver>(
        &self,
        driver: &D,
        timeout: Duration,
    ) -> DriverResult<Option<D::Element>> {
        match self {
            Self::Locate(locator) => driver.wait_for(locator, timeout).await,
            Self::ScanValue { candidates, value } => {
                for element in driver.find_all(candidates).await? {
                    if driver.attribute(&element, "value").await?.as_deref() == Some(value) {
                        return Ok(Some(element));
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Strategies for the Details control: stable id, value selector, then a scan
/// of all submit inputs.
pub fn details_strategies() -> Vec<Strategy> {
    vec![
        Strategy::Locate(Locator::id(DETAILS_BUTTON)),
        Strategy::Locate(Locator::css(format!("input[value='{}']", DETAILS_LABEL))),
        Strategy::ScanValue {
            candidates: Locator::css("input[type='submit']"),
            value: DETAILS_LABEL.to_string(),
        },
    ]
}

/// Try each strategy in order; the first match wins. Direct lookups wait up
/// to `timeout` each, scans look once.
pub async fn first_match<D: PortalDriver>(
    driver: &D,
    strategies: &[Strategy],
    timeout: Duration,
) -> DriverResult<Option<D::Element>> {
    for (i, strategy) in strategies.iter().enumerate() {
        if let Some(element) = strategy.resolve(driver, timeout).await? {
            debug!("Lookup strategy {} matched: {:?}", i + 1, strategy);
            return Ok(Some(element));
        }
    }
    Ok(None)
}
