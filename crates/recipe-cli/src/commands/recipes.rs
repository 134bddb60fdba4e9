use super::Context;
use anyhow::{Context as _, Result, bail};
use recipe_application::{ExportFormat, RecipeQuery, SortKey, SortOrder, SyncEvent};
use std::path::Path;

pub async fn list(
    context: &Context,
    sort: SortKey,
    order: SortOrder,
    search: Option<&str>,
) -> Result<()> {
    context.usecase.list_all().await?;
    let mut query = RecipeQuery::new().sort_by(sort).with_order(order);
    if let Some(search) = search {
        query = query.with_search(search);
    }

    let entries = context.usecase.recipes(&query)?;
    if entries.is_empty() {
        println!("No recipes found.");
        return Ok(());
    }
    for entry in entries {
        let updated = entry
            .update_time
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36}  {:<16}  {:<16}  {}",
            entry.id, entry.recipe_type, updated, entry.name
        );
    }
    Ok(())
}

pub async fn show(context: &Context, id: &str) -> Result<()> {
    context.usecase.load(id).await?;
    let recipe = context
        .usecase
        .registry()
        .tab(id)?
        .with_context(|| format!("Recipe {} was not opened", id))?;
    println!("{}", serde_json::to_string_pretty(&recipe.without_ui())?);
    Ok(())
}

pub async fn duplicate(context: &Context, id: &str, placeholder: &str) -> Result<()> {
    let mut events = context.usecase.events();
    context.usecase.new_tab(placeholder)?;
    let copy = context.usecase.duplicate(id).await?;
    context.usecase.queue().wait_idle().await;

    while let Ok(event) = events.try_recv() {
        if let SyncEvent::SaveFailed { id, error } = event {
            bail!("Failed to save recipe {}: {}", id, error);
        }
    }
    println!(
        "Duplicated {} as {} ({})",
        id,
        copy.id,
        copy.display_name().unwrap_or_default()
    );
    Ok(())
}

pub async fn delete(context: &Context, id: &str) -> Result<()> {
    context.usecase.delete(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub async fn export(context: &Context, id: &str, format: ExportFormat, out: &Path) -> Result<()> {
    context.usecase.load(id).await?;
    let recipe = context
        .usecase
        .registry()
        .tab(id)?
        .with_context(|| format!("Recipe {} was not opened", id))?;
    let artifact = context.usecase.export(&recipe, format)?;
    let path = artifact.write_to(out).await?;
    println!("Exported {} to {}", id, path.display());
    Ok(())
}
