//! Listings command handler
//!
//! Post, list and remove a seller's own listings in the configured store.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::listing::{Category, Listing, NewListing, PricePeriod};
use crate::store::{ListingStore, RestListingStore};
use clap::{Args, Subcommand};

/// Listings command arguments
#[derive(Args)]
pub struct ListingsArgs {
    /// Seller user id
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<ListingsCommand>,
}

/// Listings subcommands
#[derive(Subcommand)]
pub enum ListingsCommand {
    /// List the seller's listings
    Mine,
    /// Post a new listing
    Post(PostArgs),
    /// Remove one of the seller's listings
    Remove {
        /// Listing ID
        id: String,
    },
}

/// Fields of a new listing
#[derive(Args)]
pub struct PostArgs {
    /// house, car, service or product
    #[arg(long, short = 'c')]
    pub category: Category,

    #[arg(long, short = 't')]
    pub title: String,

    #[arg(long)]
    pub subcategory: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Price in ETB
    #[arg(long, short = 'p')]
    pub price: Option<f64>,

    /// month, day, hour or one-time
    #[arg(long, requires = "price")]
    pub period: Option<PricePeriod>,

    /// Address, or "<lat>, <lng>" to appear in nearby feeds
    #[arg(long, short = 'l', allow_hyphen_values = true)]
    pub location: Option<String>,
}

impl PostArgs {
    fn into_draft(self, user_id: String) -> NewListing {
        NewListing {
            subcategory: self.subcategory,
            description: self.description,
            price: self.price,
            price_period: self.period,
            location: self.location,
            ..NewListing::new(user_id, self.category, self.title)
        }
    }
}

/// Run the listings command
pub async fn run(args: ListingsArgs) -> Result<()> {
    let user = args
        .user
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| Error::Config("--user is required".to_string()))?;

    let config = Config::load()?;
    let store = RestListingStore::from_config(&config.store)?;

    match args.command.unwrap_or(ListingsCommand::Mine) {
        ListingsCommand::Mine => list_own(&store, &user).await,
        ListingsCommand::Post(post) => {
            let listing = store.create_listing(post.into_draft(user)).await?;
            println!("Posted {}", describe(&listing));
            Ok(())
        }
        ListingsCommand::Remove { id } => {
            if !store.delete_listing(&user, &id).await? {
                return Err(Error::Store(format!("No listing {} owned by {}", id, user)));
            }
            println!("Removed {}", id);
            Ok(())
        }
    }
}

async fn list_own(store: &dyn ListingStore, user: &str) -> Result<()> {
    let mut listings = store.listings_by_owner(user).await?;
    if listings.is_empty() {
        println!("No listings.");
        return Ok(());
    }

    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    println!("{} listings:\n", listings.len());
    for listing in &listings {
        println!("  {}", describe(listing));
    }
    Ok(())
}

fn describe(listing: &Listing) -> String {
    let location = listing.location.as_deref().unwrap_or("(no location)");
    format!(
        "{}  {} [{}]  {}",
        listing.id, listing.title, listing.category, location
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::listing::tests::listing_at;
    use clap::Parser;

    #[test]
    fn test_parse_post() {
        let cli = Cli::try_parse_from([
            "mella-feed",
            "listings",
            "--user",
            "u-1",
            "post",
            "--category",
            "cars",
            "--title",
            "Toyota Vitz 2012",
            "--price",
            "1200000",
            "--period",
            "one-time",
            "--location",
            "-1.29, 36.82",
        ])
        .unwrap();

        let Commands::Listings(args) = cli.command else {
            panic!("expected listings");
        };
        let Some(ListingsCommand::Post(post)) = args.command else {
            panic!("expected post");
        };

        let draft = post.into_draft(args.user.unwrap());
        assert_eq!(draft.user_id, "u-1");
        assert_eq!(draft.category, Category::Car);
        assert_eq!(draft.price_period, Some(PricePeriod::OneTime));
        assert_eq!(draft.location.as_deref(), Some("-1.29, 36.82"));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_period_requires_price() {
        let result = Cli::try_parse_from([
            "mella-feed", "listings", "-u", "u-1", "post", "-c", "house", "-t", "Villa",
            "--period", "month",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_describe() {
        let listing = listing_at("a1", "u", Some("9.02, 38.76"));
        assert_eq!(describe(&listing), "a1  Listing a1 [house]  9.02, 38.76");
    }
}
