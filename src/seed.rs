//! Startup seeding of the category catalog and trending prompts.
//!
//! Both seeds are idempotent: rows are matched on their unique text column
//! and only missing ones are inserted.

use anyhow::{Context, Result};
use sqlx::postgres::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// (name, description, emoji)
pub const CATEGORY_SEEDS: &[(&str, &str, &str)] = &[
    ("Headshot", "Professional portrait-style images, often used for profiles or resumes.", "🧑‍💼"),
    ("Cartoonify", "Transform real photos into fun cartoon-style illustrations.", "🎭"),
    ("Lifestyle", "Everyday scenes like a cozy family picnic or a sunny day at the park.", "🌞"),
    ("Dream", "Imaginative ideas like flying on a magical carpet or exploring a fantasy castle.", "💭"),
    ("Fashion", "Stylish outfits such as a colorful summer dress or a superhero costume.", "👗"),
    ("Transport", "Vehicles like a bright red fire truck or a cheerful hot air balloon.", "🚙"),
    ("World Culture", "Cultural themes like a Japanese cherry blossom festival or an African safari adventure.", "🌍"),
    ("Stories", "Storybook-inspired images like a pirate treasure hunt or a fairy tale forest.", "📖"),
    ("Sport", "Active scenes like a soccer game with friends or a fun bicycle race.", "⚽"),
    ("Animals", "Cute critters like a fluffy puppy or a playful dolphin.", "🐾"),
    ("Colors", "Vibrant designs like a rainbow-patterned kite or a sunset in warm hues.", "🌈"),
    ("Ghibli Anime", "Whimsical scenes inspired by Studio Ghibli, like a Totoro picnic or a Spirited Away train ride.", "🌀"),
    ("Nature", "Beautiful landscapes like a snowy mountain or a blooming flower garden.", "🌸"),
    ("Food", "Tasty treats like a giant ice cream sundae or a colorful fruit basket.", "🍰"),
    ("Holidays", "Festive moments like a Christmas tree lighting or a Halloween pumpkin patch.", "🎉"),
];

/// (prompt, category name)
pub const TRENDING_PROMPT_SEEDS: &[(&str, &str)] = &[
    ("Professional headshot of a confident business man, studio lighting, crisp details, corporate attire", "Headshot"),
    ("Bioluminescent underwater scene with glowing jellyfish, deep ocean blues, magical lighting", "Nature"),
    ("Cherry blossom petals falling in slow motion, soft pink hues, dreamy spring atmosphere", "Nature"),
    ("Majestic lion with flowing mane, golden hour lighting, African savanna background, photorealistic", "Animals"),
    ("Enchanted library with floating books, magical glowing orbs, wizard's study atmosphere", "Dream"),
    ("Futuristic fashion model in iridescent outfit, neon city background, cyberpunk aesthetic", "Fashion"),
    ("Vintage train traveling through autumn mountains, steam locomotive, nostalgic journey", "Transport"),
];

pub async fn seed_categories(pool: &PgPool) -> Result<u64> {
    let mut inserted = 0;

    for (name, description, emoji) in CATEGORY_SEEDS {
        let result = sqlx::query(
            "INSERT INTO categories (id, name, description, emoji, is_active)
             VALUES ($1, $2, $3, $4, TRUE)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(*name)
        .bind(*description)
        .bind(*emoji)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create category {name}"))?;

        inserted += result.rows_affected();
    }

    info!(inserted, "Category seed complete");
    Ok(inserted)
}

pub async fn seed_trending_prompts(pool: &PgPool) -> Result<u64> {
    let mut inserted = 0;

    for (prompt, category_name) in TRENDING_PROMPT_SEEDS {
        let category_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
                .bind(*category_name)
                .fetch_optional(pool)
                .await
                .context("Failed to look up category for trending prompt")?;

        let Some(category_id) = category_id else {
            warn!(category = %category_name, "Category not found, skipping trending prompt");
            continue;
        };

        let result = sqlx::query(
            "INSERT INTO trending_prompts (id, prompt, category_id, use_count, is_active)
             VALUES ($1, $2, $3, 0, TRUE)
             ON CONFLICT (prompt) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(*prompt)
        .bind(category_id)
        .execute(pool)
        .await
        .context("Failed to create trending prompt")?;

        inserted += result.rows_affected();
    }

    info!(inserted, "Trending prompt seed complete");
    Ok(inserted)
}

/// Seed categories first so trending prompts can reference them
pub async fn seed_catalog(pool: &PgPool) -> Result<()> {
    seed_categories(pool).await?;
    seed_trending_prompts(pool).await?;
    Ok(())
}
