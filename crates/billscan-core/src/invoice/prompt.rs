//! Instructions sent to the language model.

use crate::models::invoice::Category;

/// Build the structuring prompt for a receipt's OCR text.
///
/// The text is cut to at most `max_chars` characters (not bytes) so the
/// request stays within the model's context.
pub fn build_prompt(ocr_text: &str, max_chars: usize) -> String {
    let text = truncate_chars(ocr_text, max_chars);

    format!(
        r#"Extract structured data from this receipt text. Return ONLY a JSON object, with no explanation and no code fences.

Rules:
- "gst_number" is the seller's GSTIN: 15 characters, 2 digits (state code), 5 letters, 4 digits, 1 letter, then a digit 1-9 or a letter, then the letter Z or a digit 1-9 or a letter A-J, then 1 letter or digit. Use null if absent.
- "total_amount" is the grand total as a number, without currency symbols.
- "date" uses the format YYYY-MM-DD.
- Every item gets exactly one category from: {categories}.
- Use null for anything you cannot find.

JSON shape:
{{
  "gst_number": "string or null",
  "total_amount": 0.0,
  "store_name": "string or null",
  "date": "YYYY-MM-DD or null",
  "address": "string or null",
  "items": [
    {{"name": "string", "price": 0.0, "category": "one of the categories"}}
  ]
}}

Receipt text:
{text}"#,
        categories = Category::prompt_list(),
        text = text,
    )
}

/// Cut a string to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
