/// This module provides the sitemap, sitemap index and rotating writers.
pub mod sitemap;
