//! Plain-text board for the terminal

use crate::board::{BackportStatus, BoardView};
use colored::Colorize;
use std::io::{self, Write};

const TITLE_WIDTH: usize = 60;

pub fn write<W: Write>(writer: &mut W, view: &BoardView) -> io::Result<()> {
    writeln!(
        writer,
        "{} {} (merge base {})",
        view.repo.full_name.bold(),
        view.branch.cyan().bold(),
        view.merge_base.short().dimmed()
    )?;
    if let Some(author) = &view.author {
        writeln!(writer, "  author: {} <{}>", author.name, author.email)?;
    }
    if let Some(label) = &view.label {
        writeln!(writer, "  label:  {}", label)?;
    }
    writeln!(writer)?;

    if view.rows.is_empty() {
        writeln!(writer, "{}", "No commits in this window.".dimmed())?;
        return Ok(());
    }

    for row in &view.rows {
        let trunk = if row.trunk_pr_span > 0 {
            format!("#{:<7}", row.trunk_pr.number)
        } else {
            " ".repeat(8)
        };
        let marker = match row.status {
            BackportStatus::Confirmed => row.status.marker().green().to_string(),
            BackportStatus::Pending => row.status.marker().yellow().to_string(),
            BackportStatus::Absent => " ".to_string(),
        };
        let backport = match (&row.backport_pr, row.backport_pr_span > 0) {
            (Some(pr), true) => format!("#{}", pr.number),
            _ => String::new(),
        };
        let tags = if row.oldest_tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", row.oldest_tags.join(", "))
        };

        writeln!(
            writer,
            "{} {} {} {:<width$} {}{} {}",
            trunk.bold(),
            row.commit.sha.short().yellow(),
            marker,
            truncate(&row.commit.title, TITLE_WIDTH),
            row.commit.author.name.dimmed(),
            tags.dimmed(),
            backport.green(),
            width = TITLE_WIDTH
        )?;
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "{} commits: {} confirmed, {} pending, {} not backported",
        view.rows.len(),
        view.count(BackportStatus::Confirmed).to_string().green(),
        view.count(BackportStatus::Pending).to_string().yellow(),
        view.count(BackportStatus::Absent)
    )?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
