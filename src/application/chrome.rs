use time::OffsetDateTime;

use crate::application::auth::Principal;
use crate::presentation::views::{BrandView, FooterView, LayoutChrome, ViewerView};

/// Builds the layout shared by every page: brand, viewer navigation and footer.
#[derive(Clone)]
pub struct ChromeService {
    brand_title: String,
}

impl ChromeService {
    pub fn new(brand_title: impl Into<String>) -> Self {
        Self {
            brand_title: brand_title.into(),
        }
    }

    pub fn load(&self, viewer: Option<&Principal>) -> LayoutChrome {
        LayoutChrome {
            brand: BrandView {
                title: self.brand_title.clone(),
                href: "/".to_string(),
            },
            viewer: viewer.map(|principal| ViewerView {
                username: principal.username.clone(),
            }),
            footer: FooterView {
                year: OffsetDateTime::now_utc().year(),
            },
        }
    }
}
