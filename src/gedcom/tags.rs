/// Human-readable label for a GEDCOM tag. Unknown tags are shown as-is.
pub fn tag_label(tag: &str) -> &str {
    match tag {
        "ADDR" => "Address",
        "BAPM" => "Baptism",
        "BIRT" => "Birth",
        "BURI" => "Burial",
        "CALN" => "Call number",
        "CHAN" => "Last change",
        "CHR" => "Christening",
        "DEAT" => "Death",
        "DIV" => "Divorce",
        "EMAIL" => "Email",
        "EVEN" => "Event",
        "FACT" => "Fact",
        "FAM" => "Family",
        "FILE" => "Filename",
        "INDI" => "Individual",
        "MARR" => "Marriage",
        "NAME" => "Name",
        "NOTE" => "Note",
        "OBJE" => "Media object",
        "OCCU" => "Occupation",
        "PHON" => "Phone",
        "REPO" => "Repository",
        "RESI" => "Residence",
        "RESN" => "Restriction",
        "SEX" => "Gender",
        "SOUR" => "Source",
        "SUBM" => "Submitter",
        "TITL" => "Title",
        "WWW" => "URL",
        _ => tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_label() {
        assert_eq!(tag_label("BIRT"), "Birth");
        assert_eq!(tag_label("_MILT"), "_MILT");
    }
}
