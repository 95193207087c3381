//! Debate packets: prior-phase outputs serialised into later-phase prompts.

use std::collections::BTreeMap;

use serde::Serialize;

use super::roles::Role;
use crate::structured::RoleOutput;

/// Bundle embedded into the Judge's prompt.
#[derive(Debug, Serialize)]
pub struct VerdictPacket<'a> {
    pub openings: &'a BTreeMap<Role, RoleOutput>,
    pub critiques: &'a BTreeMap<Role, RoleOutput>,
}

fn pretty<T: Serialize>(value: &T) -> String {
    // Maps of JSON objects keyed by unit enum variants always serialise.
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn preamble(question: &str, context: &str) -> String {
    format!("QUESTION:\n{question}\n\nCONTEXT:\n{context}")
}

/// User message for the Opening phase: question and context only.
pub fn opening_prompt(question: &str, context: &str) -> String {
    preamble(question, context)
}

/// User message for the Critique phase: embeds every debater's opening.
pub fn critique_prompt(
    question: &str,
    context: &str,
    openings: &BTreeMap<Role, RoleOutput>,
) -> String {
    format!(
        "{}\n\nOTHER AGENTS' OPENINGS (JSON):\n{}\n\n\
         Now critique the other agents. Focus on gaps, weak assumptions, and missing options.\n\
         Return ONLY your role's JSON schema.",
        preamble(question, context),
        pretty(openings)
    )
}

/// User message for the Verdict phase: embeds all openings and critiques.
pub fn verdict_prompt(
    question: &str,
    context: &str,
    openings: &BTreeMap<Role, RoleOutput>,
    critiques: &BTreeMap<Role, RoleOutput>,
) -> String {
    let packet = VerdictPacket {
        openings,
        critiques,
    };
    format!(
        "{}\n\nDEBATE PACKET (JSON):\n{}",
        preamble(question, context),
        pretty(&packet)
    )
}
