//! Board commands: `crm-kanban show` and `crm-kanban move`.

use std::str::FromStr;

use anyhow::{Context, Result};
use console::style;
use crm_kanban::client::HttpCrmClient;
use crm_kanban::errors::KanbanError;
use crm_kanban::kanban_config::KanbanConfig;
use crm_kanban::prompt::DialoguerPrompt;
use crm_kanban_core::{
    Board, BoardController, BoardKind, CardFields, DragEvent, DropTarget, Item, TransitionOutcome,
};

fn parse_kind(kind: &str) -> Result<BoardKind, KanbanError> {
    BoardKind::from_str(&kind.to_lowercase()).map_err(|_| KanbanError::InvalidBoardKind(kind.to_string()))
}

async fn open_board(config: &KanbanConfig, kind: BoardKind) -> Result<BoardController<HttpCrmClient>> {
    config.ensure_valid()?;
    let client = HttpCrmClient::from_config(config)?;
    let mut controller = BoardController::new(kind, client, config.controller_options());
    let report = controller
        .refresh()
        .await
        .map_err(KanbanError::from)
        .with_context(|| format!("Failed to load the {} board", kind))?;
    if !report.unrecognized.is_empty() {
        println!(
            "{} {} record(s) have a stage this board does not know",
            style("⚠").yellow(),
            report.unrecognized.len()
        );
    }
    Ok(controller)
}

pub async fn cmd_show(config: &KanbanConfig, kind: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    let controller = open_board(config, kind).await?;
    print!("{}", render_board(kind, controller.board()));
    Ok(())
}

pub async fn cmd_move(
    config: &KanbanConfig,
    kind: &str,
    record_id: i64,
    stage: &str,
    position: Option<usize>,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    kind.validate_stage(stage).map_err(KanbanError::from)?;
    let mut controller = open_board(config, kind).await?;

    let item_id = controller
        .board()
        .item_by_record(record_id)
        .map(|item| item.id.clone())
        .ok_or_else(|| KanbanError::RecordNotOnBoard {
            kind: kind.to_string(),
            record_id,
        })?;
    let target = drop_target(controller.board(), stage, position)
        .ok_or_else(|| KanbanError::from(crm_kanban_core::TransitionError::InvalidStage {
            kind: kind.to_string(),
            stage: stage.to_string(),
        }))?;

    controller.handle_drag(DragEvent::KeyboardPickUp { item_id }).await;
    controller.handle_drag(DragEvent::KeyboardMove { over: target }).await;
    let mut outcome = controller.handle_drag(DragEvent::KeyboardDrop).await;

    if let TransitionOutcome::AwaitingWorkflow { .. } = outcome {
        outcome = controller
            .settle_workflow(&DialoguerPrompt)
            .await
            .map_err(KanbanError::from)?;
    }

    match outcome {
        TransitionOutcome::Committed { stage, refreshed, .. } => {
            println!("{} Record {} moved to {}", style("✓").green(), record_id, style(&stage).bold());
            if !refreshed {
                println!("  {}", style("Board could not be reloaded afterwards.").dim());
            }
            Ok(())
        }
        TransitionOutcome::NoOp => {
            println!("Record {} is already in {}; nothing to save.", record_id, stage);
            Ok(())
        }
        TransitionOutcome::RolledBack { reason, .. } => {
            println!("{} {}", style("Move reverted:").red().bold(), reason);
            anyhow::bail!("Record {} stays where it was", record_id)
        }
        other => anyhow::bail!("Unexpected result of move: {:?}", other),
    }
}

/// Where a keyboard move should land: before the item at `position`, or
/// at the end of the column.
fn drop_target(board: &Board, stage: &str, position: Option<usize>) -> Option<DropTarget> {
    let container = board.container_by_title(stage)?;
    match position.and_then(|p| container.items.get(p)) {
        Some(item) => Some(DropTarget::Item(item.id.clone())),
        None => Some(DropTarget::Container(container.id.clone())),
    }
}

fn card_line(item: &Item) -> String {
    let details: Vec<String> = match &item.fields {
        CardFields::Lead {
            organization,
            email,
            phone,
            ..
        } => [organization, email, phone].into_iter().flatten().cloned().collect(),
        CardFields::Deal {
            value, organization, ..
        } => value
            .map(|v| format!("{:.2}", v))
            .into_iter()
            .chain(organization.clone())
            .collect(),
        CardFields::Task {
            category, priority, ..
        } => [category, priority].into_iter().flatten().cloned().collect(),
    };
    let mut line = format!("  #{:<5} {}", item.record_id, item.fields.headline());
    if !details.is_empty() {
        line.push_str(&format!(" {}", style(format!("· {}", details.join(" · "))).dim()));
    }
    line
}

pub fn render_board(kind: BoardKind, board: &Board) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{} ({} records)\n",
        style(format!("{} board", kind)).bold().cyan(),
        board.len()
    ));
    for container in board.containers() {
        let mut header = format!("\n{} ({})", style(&container.title).bold(), container.items.len());
        if !container.accepts_drops {
            header.push_str(&format!(" {}", style("[read-only]").yellow()));
        }
        out.push_str(&header);
        out.push('\n');
        if container.items.is_empty() {
            out.push_str(&format!("  {}\n", style("(empty)").dim()));
        }
        for item in &container.items {
            out.push_str(&card_line(item));
            out.push('\n');
        }
    }
    out
}
