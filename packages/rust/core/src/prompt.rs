//! Underwriting prompt template.

/// Fixed memo template. `{file_content}` and `{source_context}` are the only
/// placeholders.
pub const PROMPT_TEMPLATE: &str = r#"
### Role
You are a cautious senior commercial real estate underwriter. You look for
risk first and you trust borrower-supplied figures only once market data
backs them up.

### Rules
1. Use only the two data sources below. Do not bring in outside knowledge.
2. Attribute every figure to "User Input" or "Source Context".
3. When something is not in either source, write "Data not provided".

---
### Data Source 1: User Input
{file_content}
---
### Data Source 2: Source Context
{source_context}
---

### Memo Structure

## Executive Summary
The loan request, the property, the market, and the most important risks.

## Property Overview
Property type, year built, building size (sq. ft.), lot size and key features, from User Input.

## Market Analysis
Submarket, vacancy and rental rates, and comparable sales or listings from the Source Context.
Compare against any figures in the User Input.

## Risk Assessment
- Market and flood risk, using the NFIP loss data.
- Internal risk flags from the SAFMRS data.
- Discrepancies between User Input and Source Context.
- Missing information needed for full underwriting.
- Property-specific risks.

## Preliminary Collateral Valuation
Sales comparison from the comps, an income approach if the data allows it,
and a final estimated value range.

## Analysis Confidence Score
A score from 1 to 10 with a justification based on data completeness and discrepancies.
"#;

/// Substitute the input text and the aggregate context into [`PROMPT_TEMPLATE`].
///
/// Substitution is a single pass over the template, so placeholder-like text
/// inside either value is left alone.
pub fn render_prompt(file_content: &str, source_context: &str) -> String {
    let mut out =
        String::with_capacity(PROMPT_TEMPLATE.len() + file_content.len() + source_context.len());
    let mut rest = PROMPT_TEMPLATE;

    while let Some(start) = rest.find('{') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);

        if let Some(after) = tail.strip_prefix("{file_content}") {
            out.push_str(file_content);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{source_context}") {
            out.push_str(source_context);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    out
}
