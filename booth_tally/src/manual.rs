/*!

This is the long-form manual for `booth_tally` and `form20`.

## Inputs

Each constituency to process is described in the run configuration by a
document source:

* `provider`: `pdf`, `ocr` or `text`
* `filePath`: the result document, relative to the configuration file
* `ac`: the constituency, as a canonical identifier (`TS-085`) or as a name
  (`Achampet`, `85 - Achampet (SC)`)
* `state`, `year`
* `referencePath`: the official results for this constituency and year

### `pdf`

A Form 20 document in PDF format. The text layer is read with `pdftotext`.
If it holds no booth row, the pages are rendered with `pdftoppm` and read
with `tesseract`, first at 200 dpi and then once more at 300 dpi. These
values can be changed in the `ocr` section of the configuration.

### `ocr`

Same as `pdf`, but the text layer is ignored. Use it for scans that carry a
garbled text layer.

### `text`

A document that was already converted to text. Pages are separated by form
feeds (`\x0c`), as produced by `pdftotext`.

## Official results

The official results are in one of these formats:

* JSON:

```text
{
  "acName": "Achampet",
  "state": "TS",
  "year": 2018,
  "expectedBooths": 268,
  "electors": 221340,
  "officialNota": 1590,
  "candidates": [
    { "name": "Guvvala Balaraju", "party": "TRS", "officialVotes": 88073 },
    ...
  ]
}
```

* CSV with a header `name,party,officialVotes`. A row whose name or party
  is `NOTA` holds the official NOTA count.
* Excel (`.xlsx`) with the same three columns on the first worksheet, or on
  the worksheet named by `excelWorksheetName`.

The candidates must be in the official order. It is also the order of the
columns of well-formed documents.

## Run configuration

The `form20` program reads a JSON configuration. Relative paths are relative
to the configuration file.

```text
{
  "outputSettings": { "outputDirectory": "output", "maxNeedsReview": 0 },
  "schemaPath": "schema.json",
  "workers": 8,
  "documentSources": [
    { "provider": "pdf", "filePath": "docs/TS/2018/085.pdf",
      "ac": "85 - Achampet", "state": "Telangana", "year": 2018,
      "referencePath": "official/TS-085-2018.csv", "expectedBooths": 268 }
  ],
  "thresholds": { "alignmentMaxError": 0.2, "maxBoothVotes": 5000 },
  "ocr": { "initialDpi": 200, "dpiStep": 100, "maxRetries": 1,
           "callTimeoutSecs": 120, "documentBudgetSecs": 1800 }
}
```

The `thresholds` and `ocr` sections are optional. Any value left out keeps
its default.

The results are written to one file per state and year,
`{outputDirectory}/{state}_{year}.json`, with the constituencies keyed by
canonical identifier. A constituency whose name did not resolve is kept
under its raw name and marked with `"_unmatchedKey": true`. A summary of
the run is written to `{outputDirectory}/validation_report.json`.

## Quality tiers

Every constituency gets exactly one tier. The first rule that applies wins:

| Tier           | Rule                                                             |
|----------------|------------------------------------------------------------------|
| `EMPTY`        | no booth row was extracted                                       |
| `NEEDS_REVIEW` | alignment error of 20% or more, unresolved constituency name,    |
|                | or escalated totals                                              |
| `EXCELLENT`    | booth coverage at least 95% and candidate error below 5%         |
| `GOOD`         | booth coverage at least 80% and candidate error below 10%        |
| `PARTIAL`      | booth coverage at least 50% and candidate error below 20%        |
| `POOR`         | anything else                                                    |

For `EXCELLENT`, `GOOD` and `PARTIAL` constituencies, the booth votes of
each candidate add up exactly to the official total.

All the bounds can be changed in the `thresholds` section of the
configuration.

## Corrections

The booth values are never changed silently. Each candidate gets one of
these adjustments:

* `unchanged`: the booths already add up to the official total
* `scaled`: the booths were scaled to the official total. This happens for
  small differences (5% or less), and for partial documents when the
  extracted total is between 40% and 95% of the official one.
* `gapFilled`: the column of the candidate was missing from an otherwise
  complete document. The official total is spread over the booths in
  proportion to their votes.
* `escalated`: the difference is too large to be corrected. The values are
  left as extracted and the constituency needs a review.

## Exit codes

| Code | Meaning                                                   |
|------|-----------------------------------------------------------|
| 0    | every constituency is at least `PARTIAL`                  |
| 1    | fatal error (configuration, schema, output directory)     |
| 2    | some constituency is `EMPTY`                              |
| 3    | more `NEEDS_REVIEW` constituencies than `maxNeedsReview`  |
| 4    | some constituency is `POOR`                               |

When several apply, the largest code is returned.

*/
