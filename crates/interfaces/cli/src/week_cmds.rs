use std::time::Duration;

use anyhow::{Result, bail};

use snippets_core::{SnippetKey, YearKey};
use snippets_sync::{EditorStatus, SnippetEditor, SnippetRepository};

use crate::ready;

fn header(key: SnippetKey) -> String {
    match key.date_range() {
        Some((monday, sunday)) => format!("{} ({monday} .. {sunday})", key.iso_label()),
        None => key.iso_label(),
    }
}

fn print_body(content: &str) {
    if content.is_empty() {
        println!("  (empty)");
    }
    for line in content.lines() {
        println!("  {line}");
    }
}

pub(crate) async fn show(repo: &SnippetRepository, key: SnippetKey) -> Result<()> {
    let snippet = ready(repo.snippet(key).await, &key.iso_label())?;
    println!("{}", header(key));
    print_body(&snippet.content);
    Ok(())
}

/// Runs the edit through [`SnippetEditor`] so the CLI writes exactly the way
/// an interactive session would: one edit, one debounce window, one write.
pub(crate) async fn set(repo: &SnippetRepository, key: SnippetKey, content: String, debounce: Duration) -> Result<()> {
    let editor = SnippetEditor::open(repo.clone(), key, debounce);
    let opened = editor.wait_for(|s| s.status != EditorStatus::Loading).await?;
    if opened.status == EditorStatus::LoadFailed {
        editor.close().await;
        bail!(
            "could not load {}: {}",
            key.iso_label(),
            opened.last_error.unwrap_or_default()
        );
    }
    let unchanged = opened.content == content;

    editor.edit(content).await?;
    let done = editor
        .wait_for(|s| s.edits > 0 && s.saving == 0 && (s.status == EditorStatus::Saved || s.last_error.is_some()))
        .await?;
    editor.close().await;

    if let Some(err) = done.last_error {
        bail!("{} not saved: {err}", key.iso_label());
    }
    if unchanged {
        println!("{} unchanged", key.iso_label());
    } else if done.content.is_empty() {
        println!("{} cleared", key.iso_label());
    } else {
        println!("{} saved", key.iso_label());
    }
    Ok(())
}

pub(crate) async fn history(repo: &SnippetRepository, year: i32) -> Result<()> {
    let snippets = ready(repo.annual(YearKey(year)).await, &format!("snippets for {year}"))?;
    if snippets.is_empty() {
        println!("no snippets in {year}");
        return Ok(());
    }
    for snippet in snippets {
        match snippet.key() {
            Ok(key) => println!("{}", header(key)),
            Err(err) => println!("{}-W{:02} ({err})", snippet.year, snippet.week),
        }
        print_body(&snippet.content);
        println!();
    }
    Ok(())
}
