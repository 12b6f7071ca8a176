use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use snippets_core::{DailyFragment, Day, FragmentContent, FragmentId};
use snippets_sync::{Coordinates, FragmentBuilder, FragmentLog, ImageResolver};

use crate::ready;

pub(crate) async fn list(log: &FragmentLog, images: &ImageResolver, day: Day) -> Result<()> {
    let fragments = ready(log.list(day).await, &format!("fragments for {day}"))?;
    if fragments.is_empty() {
        println!("no fragments on {day}");
        return Ok(());
    }

    for fragment in &fragments {
        let time = fragment.created_at.with_timezone(&Local).format("%H:%M:%S");
        let detail = match &fragment.content {
            FragmentContent::Text { text } => text.clone(),
            FragmentContent::Location {
                geohash,
                latitude,
                longitude,
            } => format!("{geohash} ({latitude:.5}, {longitude:.5})"),
            FragmentContent::Image { .. } => match images.resolve(fragment).await {
                Some(image) => {
                    let target = image.url.or(image.error).unwrap_or_default();
                    format!("{}x{} {target}", image.width, image.height)
                }
                None => String::new(),
            },
        };
        println!("{time}  {:<8} {}  {detail}", fragment.kind().slug(), fragment.id);
    }
    Ok(())
}

pub(crate) async fn append(log: &FragmentLog, day: Day, fragment: DailyFragment) -> Result<()> {
    log.append(day, &fragment).await?;
    println!("added {} {} to {day}", fragment.kind().slug(), fragment.id);
    Ok(())
}

pub(crate) async fn add_image(log: &FragmentLog, builder: &FragmentBuilder, day: Day, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let fragment = builder.image(bytes).await?;
    append(log, day, fragment).await
}

pub(crate) async fn add_location(
    log: &FragmentLog,
    builder: &FragmentBuilder,
    day: Day,
    latitude: f64,
    longitude: f64,
) -> Result<()> {
    let fix = Coordinates { latitude, longitude };
    let fragment = builder.location(&fix).await?;
    append(log, day, fragment).await
}

pub(crate) async fn remove(log: &FragmentLog, day: Day, id: &str) -> Result<()> {
    log.remove(day, &FragmentId::from(id)).await?;
    println!("removed {id} from {day}");
    Ok(())
}
