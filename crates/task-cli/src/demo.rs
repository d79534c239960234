//! Canned backend for `--simulate`.

use serde_json::json;
use task_client::{SimulatedTaskApi, TaskScript};

pub fn simulated_backend() -> SimulatedTaskApi {
    SimulatedTaskApi::new()
        .script(
            "/api/video/extract-transcript",
            TaskScript::new()
                .pending()
                .running(30, 100)
                .running(80, 100)
                .success(json!({
                    "transcript": "مرحبا بكم في هذه المحاضرة عن تاريخ العمارة...",
                    "language": "ar"
                })),
        )
        .script(
            "/api/video/clean-transcript",
            TaskScript::new().running(50, 100).success(json!({
                "cleaned_transcript": "مرحبا بكم في هذه المحاضرة عن تاريخ العمارة.",
                "title": "تاريخ العمارة"
            })),
        )
        .script(
            "/api/video/generate-book",
            TaskScript::new()
                .running(1, 3)
                .running(2, 3)
                .success(json!({
                    "title": "تاريخ العمارة",
                    "chapters": [
                        {"title": "المقدمة", "content": "..."},
                        {"title": "العمارة الإسلامية", "content": "..."}
                    ]
                })),
        )
        .script(
            "/api/shahid/architectural-analysis",
            TaskScript::new().pending().success(json!({
                "structure": "three-act",
                "characters": ["ليلى", "سالم"],
                "themes": ["الذاكرة", "الغربة"]
            })),
        )
        .script(
            "/api/shahid/generate-narrative",
            TaskScript::new().running(40, 100).success(json!({
                "narrative": "في مدينة ساحلية صغيرة...",
                "outline": ["البداية", "المواجهة", "النهاية"]
            })),
        )
        .script(
            "/api/shahid/build-scenes",
            TaskScript::new().running(2, 3).success(json!({
                "scenes": [
                    {"title": "البداية", "content": "...", "characters": ["ليلى"]},
                    {"title": "المواجهة", "content": "...", "characters": ["ليلى", "سالم"]},
                    {"title": "النهاية", "content": "...", "characters": ["سالم"]}
                ]
            })),
        )
}
