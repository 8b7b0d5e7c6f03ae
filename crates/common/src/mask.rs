/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

/// Masks an email address for logging (spec §4.1 "Log discipline"):
/// `local@domain` becomes `f***t@domain` when the local part is at least 3
/// characters, `**@domain` when it's 1 or 2 characters, and `***` when the
/// input has no `@` at all.
pub fn mask_email(input: &str) -> String {
    let Some((local, domain)) = input.split_once('@') else {
        return "***".to_string();
    };
    let len = local.chars().count();
    if len >= 3 {
        let first = local.chars().next().unwrap();
        let last = local.chars().next_back().unwrap();
        format!("{first}***{last}@{domain}")
    } else {
        format!("**@{domain}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_local_part() {
        assert_eq!(mask_email("alice@example.com"), "a***e@example.com");
    }

    #[test]
    fn masks_short_local_part() {
        assert_eq!(mask_email("ab@example.com"), "**@example.com");
        assert_eq!(mask_email("a@example.com"), "**@example.com");
    }

    #[test]
    fn non_email_input_is_fully_masked() {
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn exactly_three_chars_uses_long_form() {
        assert_eq!(mask_email("bob@example.com"), "b***b@example.com");
    }
}
