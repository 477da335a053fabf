//! Seed the catalog from a YAML file.
//!
//! Documents are created through the admin catalog service, so the same
//! validation and reference rules apply as in the back-office. Colors and
//! sizes that already exist (by name) and categories or subcategories whose
//! slug is taken are skipped, which makes the command safe to re-run.
//!
//! ```yaml
//! colors:
//!   - name: Sand
//!     hex: "#d8c9a7"
//! sizes:
//!   - name: S
//!     sortOrder: 1
//! categories:
//!   - name: Shirts
//!     description: Everyday shirts
//!     subcategories:
//!       - name: Oxford
//! ```
//!
//! # Environment Variables
//!
//! - `CMS_PROJECT_ID`, `CMS_DATASET`, `CMS_WRITE_TOKEN` (see admin config)

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use threadline_admin::cms::CmsClient;
use threadline_admin::config::CmsConfig;
use threadline_admin::services::CatalogService;
use threadline_admin::services::catalog::{
    CategoryInput, ColorInput, ImageInput, SizeInput, SubcategoryInput,
};
use threadline_core::cms::{Category, Color, Size, Subcategory};
use threadline_core::slug::slugify;

use super::CommandError;

/// Top-level seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSeed {
    #[serde(default)]
    pub colors: Vec<ColorInput>,
    #[serde(default)]
    pub sizes: Vec<SizeInput>,
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInput>,
    #[serde(default)]
    pub subcategories: Vec<SubcategorySeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategorySeed {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInput>,
}

impl CategorySeed {
    fn slug(&self) -> String {
        seed_slug(&self.name, self.slug.as_deref())
    }

    fn input(&self) -> CategoryInput {
        CategoryInput {
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

impl SubcategorySeed {
    fn slug(&self) -> String {
        seed_slug(&self.name, self.slug.as_deref())
    }

    fn input(&self, category_id: &str) -> SubcategoryInput {
        SubcategoryInput {
            name: self.name.clone(),
            slug: self.slug.clone(),
            category_id: category_id.to_string(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

fn seed_slug(name: &str, slug: Option<&str>) -> String {
    slug.map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| slugify(name), str::to_string)
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

/// Parse a seed file.
///
/// # Errors
///
/// Returns `CommandError::Yaml` for malformed YAML or unknown keys.
pub fn parse(content: &str) -> Result<CatalogSeed, CommandError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Create the documents listed in `file`.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read or parsed, the CMS
/// configuration is missing, or a document is rejected. Documents created
/// before the failure are kept.
pub async fn catalog(file: &Path) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    info!(path = %file.display(), "Loading catalog seed");
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CommandError::Io {
            path: file.display().to_string(),
            source,
        })?;
    let seed = parse(&content)?;
    info!(
        colors = seed.colors.len(),
        sizes = seed.sizes.len(),
        categories = seed.categories.len(),
        "Parsed seed file"
    );

    let cms = CmsClient::new(&CmsConfig::from_env()?);
    let report = apply(&CatalogService::new(&cms), seed).await?;

    info!(
        created = report.created,
        skipped = report.skipped,
        "Seeding complete!"
    );
    Ok(())
}

async fn apply(
    service: &CatalogService<'_>,
    seed: CatalogSeed,
) -> Result<SeedReport, CommandError> {
    let mut report = SeedReport::default();

    let mut colors = lowercase_names(service.list::<Color>().await?.iter().map(|c| &c.name));
    for input in seed.colors {
        if colors.insert(input.name.to_lowercase()) {
            let color = service.create_color(input).await?;
            info!(id = %color.id, name = %color.name, "Created color");
            report.created += 1;
        } else {
            warn!(name = %input.name, "Color exists, skipping");
            report.skipped += 1;
        }
    }

    let mut sizes = lowercase_names(service.list::<Size>().await?.iter().map(|s| &s.name));
    for input in seed.sizes {
        if sizes.insert(input.name.to_lowercase()) {
            let size = service.create_size(input).await?;
            info!(id = %size.id, name = %size.name, "Created size");
            report.created += 1;
        } else {
            warn!(name = %input.name, "Size exists, skipping");
            report.skipped += 1;
        }
    }

    let categories = service.list::<Category>().await?;
    let subcategory_slugs: HashSet<String> = service
        .list::<Subcategory>()
        .await?
        .into_iter()
        .map(|s| s.slug.current)
        .collect();

    for category_seed in seed.categories {
        let slug = category_seed.slug();
        let category_id = if let Some(existing) =
            categories.iter().find(|c| c.slug.current == slug)
        {
            warn!(slug = %slug, "Category exists, skipping");
            report.skipped += 1;
            existing.id.clone()
        } else {
            let category = service.create_category(category_seed.input()).await?;
            info!(id = %category.id, slug = %slug, "Created category");
            report.created += 1;
            category.id
        };

        for sub in &category_seed.subcategories {
            let sub_slug = sub.slug();
            if subcategory_slugs.contains(&sub_slug) {
                warn!(slug = %sub_slug, "Subcategory exists, skipping");
                report.skipped += 1;
                continue;
            }
            let subcategory = service.create_subcategory(sub.input(&category_id)).await?;
            info!(id = %subcategory.id, slug = %sub_slug, "Created subcategory");
            report.created += 1;
        }
    }

    Ok(report)
}

fn lowercase_names<'a>(names: impl Iterator<Item = &'a String>) -> HashSet<String> {
    names.map(|n| n.to_lowercase()).collect()
}
