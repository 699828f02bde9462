//! Common regex patterns for receipt text and model responses.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // GSTIN: state code, PAN (5 letters, 4 digits, letter), entity number,
    // default 'Z', check character.
    pub static ref GSTIN_PATTERN: Regex = Regex::new(
        r"[0-9]{2}[a-zA-Z]{5}[0-9]{4}[a-zA-Z][1-9A-Za-z][Zz1-9A-Ja-j][0-9a-zA-Z]"
    ).unwrap();

    pub static ref GSTIN_EXACT: Regex = Regex::new(
        r"^[0-9]{2}[a-zA-Z]{5}[0-9]{4}[a-zA-Z][1-9A-Za-z][Zz1-9A-Ja-j][0-9a-zA-Z]$"
    ).unwrap();

    // Labeled GSTIN ("GSTIN: ...", "GST No. ...")
    pub static ref GSTIN_LABELED: Regex = Regex::new(
        r"(?i)(?:GSTIN|GST\s*(?:No|Number|Reg(?:istration)?)?)\.?[\s:#-]*([0-9]{2}[a-zA-Z]{5}[0-9]{4}[a-zA-Z][1-9A-Za-z][Zz1-9A-Ja-j][0-9a-zA-Z])"
    ).unwrap();

    // Captcha answers issued by the registry are six digits.
    pub static ref CAPTCHA_ANSWER: Regex = Regex::new(r"^[0-9]{6}$").unwrap();

    // Fenced code block, optionally tagged as json.
    pub static ref FENCED_BLOCK: Regex = Regex::new(
        r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```"
    ).unwrap();

    // Dates
    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_DAY_MONTH_NAME: Regex = Regex::new(
        r"(?i)\b(\d{1,2})[\s\-]+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[\s\-,]+(\d{4})\b"
    ).unwrap();

    // Currency markers stripped before parsing amounts.
    pub static ref CURRENCY_MARKER: Regex = Regex::new(
        r"(?i)₹|\brs\.?|\binr\b|\$"
    ).unwrap();
}
