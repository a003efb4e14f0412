use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::study;

/// One method column on the comparison page: the subdirectory name and its
/// video files, sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodColumn {
    pub name: String,
    pub videos: Vec<String>,
}

/// Which subject+sentence combination the page shows.
#[derive(Debug, Clone, PartialEq)]
enum Selection {
    /// First combination alphabetically (the default)
    First,
    All,
    Combo(String),
}

impl Selection {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("FIRST") => Selection::First,
            Some("ALL") => Selection::All,
            Some(combo) => Selection::Combo(combo.to_string()),
        }
    }
}

#[derive(Clone)]
struct ViewerState {
    root: PathBuf,
}

#[derive(Deserialize)]
struct ViewerQuery {
    subject: Option<String>,
}

/// Runs the debug comparison server until interrupted.
pub async fn serve(root: PathBuf, port: u16) -> Result<()> {
    let state = Arc::new(ViewerState { root: root.clone() });

    let app = Router::new()
        .route("/", get(index))
        .nest_service("/files", ServeDir::new(root))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("debug viewer listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index(
    State(state): State<Arc<ViewerState>>,
    Query(query): Query<ViewerQuery>,
) -> Html<String> {
    let selection = Selection::parse(query.subject.as_deref());
    match collect_methods(&state.root) {
        Ok(columns) if columns.is_empty() => Html(format!(
            "<h3>No subdirectories found in {}</h3>",
            state.root.display()
        )),
        Ok(columns) => Html(render_page(&state.root, &columns, &selection)),
        Err(e) => Html(format!("<h3>Failed to read {}: {e}</h3>", state.root.display())),
    }
}

/// Lists each method subdirectory with its sorted mp4 files.
pub fn collect_methods(root: &Path) -> Result<Vec<MethodColumn>> {
    let mut columns = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("Failed to read {}", root.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    for dir in entries {
        let name = match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let mut videos: Vec<String> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "mp4"))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        videos.sort();
        columns.push(MethodColumn { name, videos });
    }
    Ok(columns)
}

/// All `"{subject} {sentence}"` combinations present across the columns,
/// sorted for the dropdown.
pub fn subject_combinations(columns: &[MethodColumn]) -> Vec<String> {
    let mut combos = BTreeSet::new();
    for column in columns {
        for video in &column.videos {
            let stem = video.trim_end_matches(".mp4");
            if let Some(key) = study::parse_viewer_stem(stem) {
                combos.insert(format!("{} {}", key.subject, key.sentence));
            }
        }
    }
    combos.into_iter().collect()
}

/// Videos from one column matching the selection.
pub fn filter_videos<'a>(
    column: &'a MethodColumn,
    selection_combo: Option<&str>,
) -> Vec<&'a String> {
    let Some(combo) = selection_combo else {
        return column.videos.iter().collect();
    };
    let Some((subject, sentence)) = combo.split_once(' ') else {
        return Vec::new();
    };
    column
        .videos
        .iter()
        .filter(|video| {
            let stem = video.trim_end_matches(".mp4");
            study::parse_viewer_stem(stem)
                .is_some_and(|key| key.subject == subject && key.sentence == sentence)
        })
        .collect()
}

fn render_page(root: &Path, columns: &[MethodColumn], selection: &Selection) -> String {
    let combos = subject_combinations(columns);
    let num_methods = columns.len().max(1);
    let video_width = (1200 / num_methods).clamp(200, 400);

    let selection_combo: Option<String> = match selection {
        Selection::All => None,
        Selection::First => combos.first().cloned(),
        Selection::Combo(combo) => Some(combo.clone()),
    };

    let mut out = format!(
        r#"<style>
    body {{ margin: 20px; font-family: sans-serif; }}
    .controls {{
        margin-bottom: 20px; padding: 15px;
        background-color: #f8f9fa; border-radius: 8px; border: 1px solid #dee2e6;
    }}
    .controls select {{
        padding: 8px 12px; font-size: 14px; border: 1px solid #ccc;
        border-radius: 4px; background-color: white; margin-left: 10px;
    }}
    .controls label {{ font-weight: bold; font-size: 14px; }}
    .container {{ display: flex; flex-wrap: wrap; gap: 10px; }}
    .method-column {{
        flex: 1; min-width: {video_width}px; text-align: center;
        border: 1px solid #ddd; padding: 10px; border-radius: 8px;
    }}
    .method-title {{
        font-weight: bold; font-size: 16px; margin-bottom: 10px;
        background-color: #f0f0f0; padding: 8px; border-radius: 4px;
    }}
    video {{
        width: 100%; max-width: {video_width}px; height: auto;
        border: 1px solid #ccc; border-radius: 4px; margin-bottom: 8px;
    }}
    .video-name {{ font-size: 12px; color: #666; margin-bottom: 5px; }}
    .loading-indicator {{ color: #666; font-style: italic; margin-top: 10px; }}
</style>
<script>
    let videosToLoad = 0;
    let videosLoaded = 0;

    function onVideoLoaded() {{
        videosLoaded++;
        const indicator = document.getElementById('loading-indicator');
        if (videosLoaded < videosToLoad) {{
            indicator.textContent = `Loading videos... (${{videosLoaded}}/${{videosToLoad}})`;
        }} else {{
            indicator.style.display = 'none';
            document.querySelectorAll('video').forEach(video => {{
                video.currentTime = 0;
                video.play().catch(e => console.log('Autoplay prevented:', e));
            }});
        }}
    }}

    function initializeVideos() {{
        const videos = document.querySelectorAll('video');
        videosToLoad = videos.length;
        videos.forEach(video => {{
            video.addEventListener('canplaythrough', onVideoLoaded, {{ once: true }});
            video.addEventListener('error', onVideoLoaded, {{ once: true }});
            video.load();
        }});
    }}

    function onSubjectChange() {{
        const select = document.getElementById('subject-select');
        const url = new URL(window.location.href);
        url.searchParams.set('subject', select.value);
        window.location.href = url.toString();
    }}

    document.addEventListener('DOMContentLoaded', initializeVideos);
</script>
"#
    );

    out.push_str(&format!(
        "<h2>Video Comparison: {}</h2>\n",
        root.file_name().and_then(|n| n.to_str()).unwrap_or(".")
    ));

    out.push_str("<div class='controls'>");
    out.push_str("<label for='subject-select'>Show subject:</label>");
    out.push_str("<select id='subject-select' onchange='onSubjectChange()'>");
    out.push_str(&format!(
        "<option value='FIRST'{}>First subject only (default)</option>",
        selected_attr(matches!(selection, Selection::First))
    ));
    out.push_str(&format!(
        "<option value='ALL'{}>All subjects</option>",
        selected_attr(matches!(selection, Selection::All))
    ));
    for combo in &combos {
        let is_selected = matches!(selection, Selection::Combo(c) if c == combo);
        out.push_str(&format!(
            "<option value='{combo}'{}>Subject {combo}</option>",
            selected_attr(is_selected)
        ));
    }
    out.push_str("</select></div>");

    match &selection_combo {
        Some(combo) => out.push_str(&format!(
            "<p>Showing subject {combo} across {num_methods} methods</p>"
        )),
        None => out.push_str(&format!(
            "<p>Showing all subjects across {num_methods} methods</p>"
        )),
    }

    out.push_str("<div id='loading-indicator' class='loading-indicator'>Preparing videos...</div>");
    out.push_str("<div class='container'>");

    for column in columns {
        out.push_str("<div class='method-column'>");
        out.push_str(&format!("<div class='method-title'>{}</div>", column.name));

        let videos = filter_videos(column, selection_combo.as_deref());
        if videos.is_empty() {
            out.push_str("<p>No matching videos found</p>");
        } else {
            for video in videos {
                out.push_str(&format!("<div class='video-name'>{video}</div>"));
                out.push_str(&format!(
                    "<video controls muted loop preload=\"auto\">\
                     <source src=\"/files/{}/{video}\" type=\"video/mp4\">\
                     </video>",
                    column.name
                ));
            }
        }
        out.push_str("</div>");
    }

    out.push_str("</div>");
    out
}

fn selected_attr(selected: bool) -> &'static str {
    if selected { " selected" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_column(name: &str, videos: &[&str]) -> MethodColumn {
        MethodColumn {
            name: name.to_string(),
            videos: videos.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_collect_methods() {
        let dir = tempfile::tempdir().unwrap();
        for method in ["gaga", "ga"] {
            let sub = dir.path().join(method);
            fs::create_dir(&sub).unwrap();
            fs::write(sub.join(format!("{method}_heygen_A_104.mp4")), b"").unwrap();
            fs::write(sub.join("notes.txt"), b"").unwrap();
        }
        fs::write(dir.path().join("stray.mp4"), b"").unwrap();

        let columns = collect_methods(dir.path()).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ga", "gaga"]);
        assert_eq!(columns[0].videos, vec!["ga_heygen_A_104.mp4"]);
    }

    #[test]
    fn test_subject_combinations_sorted_and_unique() {
        let columns = vec![
            make_column("ga", &["ga_heygen_B_302.mp4", "ga_heygen_A_104.mp4"]),
            make_column("hr", &["hr_heygen_A_104.mp4", "nersemble_218_ckpt.mp4"]),
        ];
        assert_eq!(
            subject_combinations(&columns),
            vec!["104 A", "218 A", "302 B"]
        );
    }

    #[test]
    fn test_filter_videos() {
        let column = make_column(
            "ga",
            &["ga_heygen_A_104.mp4", "ga_heygen_B_104.mp4", "readme.mp4"],
        );

        // No selection shows everything
        assert_eq!(filter_videos(&column, None).len(), 3);

        let matched = filter_videos(&column, Some("104 B"));
        assert_eq!(matched, vec!["ga_heygen_B_104.mp4"]);

        assert!(filter_videos(&column, Some("999 A")).is_empty());
        assert!(filter_videos(&column, Some("garbage")).is_empty());
    }

    #[test]
    fn test_render_page_marks_selection() {
        let columns = vec![make_column("ga", &["ga_heygen_A_104.mp4"])];
        let page = render_page(Path::new("/tmp/videos"), &columns, &Selection::All);
        assert!(page.contains("<option value='ALL' selected>"));
        assert!(page.contains("/files/ga/ga_heygen_A_104.mp4"));

        let page = render_page(
            Path::new("/tmp/videos"),
            &columns,
            &Selection::Combo("104 A".into()),
        );
        assert!(page.contains("<option value='104 A' selected>"));
        assert!(page.contains("Showing subject 104 A"));
    }
}
