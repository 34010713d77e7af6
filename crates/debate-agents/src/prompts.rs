use debate_models::{DataFolder, PersonaConfig};

/// Reply format every analyst must end its answer with.
fn reply_schema() -> String {
    let example = serde_json::json!({
        "decision": "BUY | SELL | HOLD",
        "positionsize": "<shares held at the end of today>",
        "position": "<true if positionsize > 0>",
        "content": "Insights: <the part of your report to store>"
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

/// Position rules shared by every persona, independent of its instructions.
pub fn decision_rules() -> &'static str {
    "## DECISION RULES\n\n\
     - `positionsize` is the number of shares held at the END of today, not the number traded.\n\
     - `position` is true exactly when `positionsize` > 0.\n\
     - Read `yesterday.position` and `yesterday.positionsize` from the input first.\n\n\
     If yesterday's position is true you may BUY, SELL or HOLD:\n\
     - BUY: positionsize = yesterday's positionsize + shares bought (must be larger than yesterday's).\n\
     - SELL: positionsize = yesterday's positionsize - shares sold (must be smaller than yesterday's, 0 closes the position).\n\
     - HOLD: positionsize and position stay exactly as yesterday.\n\n\
     If yesterday's position is false you may only BUY or HOLD:\n\
     - BUY: positionsize > 0 and position = true.\n\
     - HOLD: positionsize = 0 and position = false.\n\
     - Never SELL when nothing is held. Answer HOLD instead.\n\n\
     You may choose any number of shares except exactly 10 or 100.\n"
}

fn describe_folders(folders: &[DataFolder]) -> String {
    if folders.is_empty() {
        return String::new();
    }
    let labels: Vec<&str> = folders.iter().map(|f| f.label()).collect();
    format!(
        "Your `data` object holds the records of these folders, keyed by folder name: {}.\n",
        labels.join(", ")
    )
}

/// Build the system prompt for one persona and ticker.
pub fn render_system_prompt(persona: &PersonaConfig, ticker: &str, company: &str) -> String {
    let mut prompt = format!(
        "{}\n\n\
         You are one of several analysts debating today's trading decision for {company} ({ticker}). \
         The user message is a JSON object with today's date, today's opening price (`price.open`), \
         yesterday's state (`yesterday`), and your data.\n",
        persona.instructions.trim()
    );

    prompt.push_str(&describe_folders(&persona.folders));
    if persona.include_timeseries {
        prompt.push_str(
            "`open_series` holds the most recent opening prices, oldest first. \
             Predict how the series continues and decide based on that prediction.\n",
        );
    }

    prompt.push_str(
        "\nWrite your report, then reflect on it. Do not copy yesterday's content; \
         every section must be updated for today.\n\n",
    );
    prompt.push_str(decision_rules());
    prompt.push_str(&format!(
        "\n## RESPONSE FORMAT\n\n\
         End your answer with exactly one JSON object of this shape (template v{}):\n{}\n",
        persona.template_version,
        reply_schema()
    ));
    prompt
}
