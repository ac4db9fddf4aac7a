//! HTML board page

use crate::board::{BackportStatus, BoardRow, BoardView};
use std::io::{self, Write};

/// Render the board into a string.
pub fn render(view: &BoardView) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write(&mut buf, view);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn write<W: Write>(writer: &mut W, view: &BoardView) -> io::Result<()> {
    let full_name = &view.repo.full_name;

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} · {branch} · backboard</title>
    <style>
        :root {{
            --bg: #f5f5f7;
            --card: #ffffff;
            --border: #d2d2d7;
            --text: #1d1d1f;
            --dim: #86868b;
            --ok: #34c759;
            --pending: #ff9f0a;
            --accent: #007aff;
        }}
        * {{ box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Helvetica Neue', Helvetica, Arial, sans-serif;
            background: var(--bg);
            color: var(--text);
            margin: 0;
            line-height: 1.4;
        }}
        .container {{ max-width: 1400px; margin: 0 auto; padding: 2rem; }}
        .header {{ display: flex; align-items: baseline; gap: 1rem; margin-bottom: 1.5rem; }}
        .logo {{ font-size: 1.75rem; font-weight: 700; }}
        .subtitle {{ color: var(--dim); }}
        form.filters {{ display: flex; flex-wrap: wrap; gap: 0.75rem; margin-bottom: 1rem; }}
        form.filters label {{ color: var(--dim); font-size: 0.875rem; }}
        .stats {{ display: flex; gap: 1.5rem; margin-bottom: 1rem; color: var(--dim); }}
        table {{ width: 100%; border-collapse: collapse; background: var(--card); }}
        th, td {{ border: 1px solid var(--border); padding: 0.35rem 0.5rem; vertical-align: top; text-align: left; }}
        th {{ background: #fafafa; font-weight: 600; }}
        td.status {{ text-align: center; width: 2rem; }}
        tr.confirmed td.status {{ color: var(--ok); }}
        tr.pending td.status {{ color: var(--pending); }}
        .sha {{ font-family: SFMono-Regular, Menlo, monospace; font-size: 0.8125rem; }}
        .tag {{ display: inline-block; margin-right: 0.25rem; padding: 0 0.3rem; border-radius: 4px; background: #eef; font-size: 0.75rem; }}
        .label {{ display: inline-block; margin-right: 0.25rem; padding: 0 0.3rem; border-radius: 4px; background: #efe; font-size: 0.75rem; }}
        .hint {{ margin-top: 0.25rem; color: var(--dim); font-size: 0.75rem; }}
        a {{ color: var(--accent); text-decoration: none; }}
    </style>
</head>
<body>
<div class="container">
    <div class="header">
        <span class="logo">backboard</span>
        <span class="subtitle">{title} · {branch} · merge base <span class="sha">{merge_base}</span></span>
    </div>
"#,
        title = escape(full_name),
        branch = escape(&view.branch),
        merge_base = escape(view.merge_base.short()),
    )?;

    write_filters(writer, view)?;

    writeln!(
        writer,
        r#"    <div class="stats"><span>{} commits</span><span>{} ✓ confirmed</span><span>{} ◷ pending</span><span>{} not backported</span></div>"#,
        view.rows.len(),
        view.count(BackportStatus::Confirmed),
        view.count(BackportStatus::Pending),
        view.count(BackportStatus::Absent),
    )?;

    writeln!(writer, "    <table>")?;
    writeln!(
        writer,
        "        <tr><th>Pull request</th><th>Commit</th><th>Author</th><th>Oldest tags</th><th></th><th>Backport</th></tr>"
    )?;
    for row in &view.rows {
        write_row(writer, view, row)?;
    }
    writeln!(writer, "    </table>")?;

    writeln!(writer, "</div>\n</body>\n</html>")?;
    Ok(())
}

fn write_filters<W: Write>(writer: &mut W, view: &BoardView) -> io::Result<()> {
    writeln!(writer, r#"    <form class="filters" method="get" action="/">"#)?;

    writeln!(writer, r#"        <label>Repository <select name="repo" onchange="this.form.submit()">"#)?;
    for repo in &view.repos {
        let id = repo.id.to_string();
        write_option(writer, &id, &repo.full_name, repo.id == view.repo.id)?;
    }
    writeln!(writer, "        </select></label>")?;

    writeln!(writer, r#"        <label>Branch <select name="branch" onchange="this.form.submit()">"#)?;
    for branch in &view.branches {
        write_option(writer, branch, branch, *branch == view.branch)?;
    }
    writeln!(writer, "        </select></label>")?;

    writeln!(writer, r#"        <label>Author <select name="author" onchange="this.form.submit()">"#)?;
    write_option(writer, "", "anyone", view.author.is_none())?;
    for user in &view.authors {
        let text = format!("{} <{}>", user.name, user.email);
        write_option(writer, &user.email, &text, view.author.as_ref() == Some(user))?;
    }
    writeln!(writer, "        </select></label>")?;

    writeln!(writer, r#"        <label>Label <select name="label" onchange="this.form.submit()">"#)?;
    write_option(writer, "", "any", view.label.is_none())?;
    for label in &view.labels {
        write_option(writer, label, label, view.label.as_deref() == Some(label.as_str()))?;
    }
    writeln!(writer, "        </select></label>")?;

    writeln!(writer, "        <noscript><button type=\"submit\">Show</button></noscript>")?;
    writeln!(writer, "    </form>")
}

fn write_option<W: Write>(writer: &mut W, value: &str, text: &str, selected: bool) -> io::Result<()> {
    writeln!(
        writer,
        r#"            <option value="{}"{}>{}</option>"#,
        escape(value),
        if selected { " selected" } else { "" },
        escape(text)
    )
}

fn write_row<W: Write>(writer: &mut W, view: &BoardView, row: &BoardRow) -> io::Result<()> {
    let base = format!("https://github.com/{}/{}", view.repo.owner, view.repo.name);
    writeln!(writer, r#"        <tr class="{}">"#, row.status.as_str())?;

    if row.trunk_pr_span > 0 {
        write!(
            writer,
            r#"            <td rowspan="{}"><a href="{}/pull/{}">#{}</a> {}"#,
            row.trunk_pr_span,
            base,
            row.trunk_pr.number,
            row.trunk_pr.number,
            escape(&row.trunk_pr.title)
        )?;
        for label in &row.trunk_pr.labels {
            write!(writer, r#" <span class="label">{}</span>"#, escape(label))?;
        }
        if row.backportable {
            if let Some(hint) = cherry_pick_hint(view, row.trunk_pr.number) {
                write!(writer, r#"<div class="hint sha">{}</div>"#, escape(&hint))?;
            }
        }
        writeln!(writer, "</td>")?;
    }

    writeln!(
        writer,
        r#"            <td><a class="sha" href="{}/commit/{}">{}</a> {}</td>"#,
        base,
        escape(row.commit.sha.as_str()),
        escape(row.commit.sha.short()),
        escape(&row.commit.title)
    )?;
    writeln!(writer, "            <td>{}</td>", escape(&row.commit.author.name))?;

    write!(writer, "            <td>")?;
    for tag in &row.oldest_tags {
        write!(writer, r#"<span class="tag">{}</span>"#, escape(tag))?;
    }
    writeln!(writer, "</td>")?;

    writeln!(writer, r#"            <td class="status">{}</td>"#, row.status.marker())?;

    if row.backport_pr_span > 0 {
        match &row.backport_pr {
            Some(pr) => writeln!(
                writer,
                r#"            <td rowspan="{}"><a href="{}/pull/{}">#{}</a> {}</td>"#,
                row.backport_pr_span,
                base,
                pr.number,
                pr.number,
                escape(&pr.title)
            )?,
            None => writeln!(writer, r#"            <td rowspan="{}"></td>"#, row.backport_pr_span)?,
        }
    }

    writeln!(writer, "        </tr>")
}

/// `git cherry-pick` command for every commit of a trunk pull request,
/// oldest first.
pub fn cherry_pick_hint(view: &BoardView, trunk_pr: u64) -> Option<String> {
    let shas = view.trunk_pr_commits.get(&trunk_pr)?;
    if shas.is_empty() {
        return None;
    }
    let args: Vec<&str> = shas.iter().rev().map(|s| s.as_str()).collect();
    Some(format!("git cherry-pick {}", args.join(" ")))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{self, BoardQuery};
    use crate::model::{BranchCommits, Commit, PullRequest, Repo, Sha, User};

    fn view() -> BoardView {
        let mut repo = Repo::new("o", "r", 1);
        let ann = User::new("Ann \"A\"", "ann@example.com");
        let c1 = Commit::new(Sha::new("aaaaaaaaaaaa1"), ann.clone(), "kv: <fix> one")
            .with_oldest_tag("v1.0.0");
        let c2 = Commit::new(Sha::new("aaaaaaaaaaaa2"), ann.clone(), "kv: fix two");
        let c3 = Commit::new(Sha::new("aaaaaaaaaaaa3"), ann, "sql: ported");
        repo.release_branches = vec!["release-1".into()];
        repo.trunk_commits = vec![c3.clone(), c2, c1];
        repo.merge_bases.insert("release-1".into(), Sha::new("aaaaaaaaaaaa1"));
        repo.trunk_prs.insert(Sha::new("aaaaaaaaaaaa1"), 10);
        repo.trunk_prs.insert(Sha::new("aaaaaaaaaaaa2"), 10);
        repo.trunk_prs.insert(Sha::new("aaaaaaaaaaaa3"), 11);
        repo.pulls
            .insert(10, PullRequest::new(10, "kv: fixes & more", "master").with_labels(["backport"]));
        repo.pulls.insert(11, PullRequest::new(11, "sql", "master"));
        repo.pulls.insert(12, PullRequest::new(12, "release-1: sql", "release-1"));
        repo.branch_prs
            .entry(c3.message_id.clone())
            .or_default()
            .insert("release-1".into(), 12);
        repo.branch_commits
            .insert("release-1".into(), BranchCommits::new(vec![c3]));
        board::build(&[repo], &BoardQuery::default(), None).unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_render_escapes_text() {
        let html = render(&view());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("kv: &lt;fix&gt; one"));
        assert!(html.contains("kv: fixes &amp; more"));
        assert!(html.contains("Ann &quot;A&quot;"));
        assert!(!html.contains("<fix>"));
    }

    #[test]
    fn test_rowspans() {
        let html = render(&view());
        assert!(html.contains(r#"<td rowspan="2"><a href="https://github.com/o/r/pull/10">#10</a>"#));
        assert!(html.contains(r#"<td rowspan="1"><a href="https://github.com/o/r/pull/12">#12</a>"#));
        assert!(html.contains(r#"<span class="tag">v1.0.0</span>"#));
        assert!(html.contains(r#"<option value="release-1" selected>release-1</option>"#));
    }

    #[test]
    fn test_cherry_pick_hint_oldest_first() {
        let view = view();
        assert_eq!(
            cherry_pick_hint(&view, 10).as_deref(),
            Some("git cherry-pick aaaaaaaaaaaa1 aaaaaaaaaaaa2")
        );
        assert_eq!(cherry_pick_hint(&view, 99), None);
        assert!(render(&view).contains("git cherry-pick aaaaaaaaaaaa1 aaaaaaaaaaaa2"));
    }
}
